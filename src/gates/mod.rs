//! Ordered, short-circuiting gate pipeline.
//!
//! Gates run only on a cache miss, after integrity has passed. The first
//! gate that does not allow stops the pipeline. A gate whose capability is
//! missing from the inventory auto-passes without being consulted.

pub mod attestation;
pub mod policy;

use tracing::debug;

use crate::decision::{Decision, DenyReason, GateKind};
use crate::descriptor::{Descriptor, SecurityFlags};
use crate::inventory::Capabilities;

pub use attestation::{
    AlwaysAllow, AttestationGate, EnclaveAttestor, EnclaveGate, RootOfTrust,
};
pub use policy::{BehaviorGate, PolicyGate};

/// A single gate's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Gate passes the descriptor.
    Allow,
    /// Gate vetoes the descriptor.
    Deny,
    /// Verdict is not available yet. Treated as a deny.
    Pending,
}

/// One stage of the pipeline.
pub trait Gate: Send + Sync {
    /// Which stage this is.
    fn kind(&self) -> GateKind;

    /// Capability that must be present for the gate to run.
    fn requires(&self) -> Capabilities;

    /// Evaluate a decoded, integrity-checked descriptor.
    fn check(&self, descriptor: &Descriptor) -> Verdict;
}

/// The gate pipeline bound to a fixed inventory.
pub struct Pipeline {
    gates: Vec<Box<dyn Gate>>,
    capabilities: Capabilities,
}

impl Pipeline {
    /// Build a pipeline from gates in evaluation order.
    pub fn new(gates: Vec<Box<dyn Gate>>, capabilities: Capabilities) -> Self {
        Self {
            gates,
            capabilities,
        }
    }

    /// The standard four-gate pipeline: policy, behavior monitor, secure
    /// enclave, hardware attestation.
    pub fn standard(
        capabilities: Capabilities,
        deny_flags: SecurityFlags,
        enclave: Box<dyn EnclaveAttestor>,
        root_of_trust: Box<dyn RootOfTrust>,
    ) -> Self {
        Self::new(
            vec![
                Box::new(PolicyGate::new(deny_flags)),
                Box::new(BehaviorGate),
                Box::new(EnclaveGate::new(enclave)),
                Box::new(AttestationGate::new(root_of_trust)),
            ],
            capabilities,
        )
    }

    /// Gate kinds in evaluation order.
    pub fn stages(&self) -> Vec<GateKind> {
        self.gates.iter().map(|g| g.kind()).collect()
    }

    /// Run the gates in order and stop at the first non-allow verdict.
    pub fn run(&self, descriptor: &Descriptor) -> Decision {
        for gate in &self.gates {
            let kind = gate.kind();
            if !self.capabilities.contains(gate.requires()) {
                debug!(gate = %kind, "capability unavailable, gate auto-passes");
                continue;
            }
            match gate.check(descriptor) {
                Verdict::Allow => debug!(gate = %kind, "gate passed"),
                Verdict::Deny => {
                    debug!(gate = %kind, flags = ?descriptor.flags(), "gate vetoed");
                    return Decision::Deny(DenyReason::GateVeto { gate: kind });
                }
                Verdict::Pending => {
                    tracing::warn!(gate = %kind, "gate verdict pending, denying");
                    return Decision::Deny(DenyReason::GateTimeout { gate: kind });
                }
            }
        }
        Decision::Allow
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
