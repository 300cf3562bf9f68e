//! Secure-enclave and hardware-attestation gates.
//!
//! Both delegate to an external collaborator. No real enclave or root of
//! trust is implemented here; [`AlwaysAllow`] is the default collaborator.

use crate::decision::GateKind;
use crate::descriptor::Descriptor;
use crate::inventory::Capabilities;

use super::{Gate, Verdict};

/// Validates a descriptor inside a secure enclave.
pub trait EnclaveAttestor: Send + Sync {
    /// Verdict for `descriptor`. Must not block; return
    /// [`Verdict::Pending`] if the enclave has not answered.
    fn validate(&self, descriptor: &Descriptor) -> Verdict;
}

/// Attests a descriptor against a hardware root of trust.
pub trait RootOfTrust: Send + Sync {
    /// Verdict for `descriptor`. Must not block; return
    /// [`Verdict::Pending`] if no quote is available yet.
    fn attest(&self, descriptor: &Descriptor) -> Verdict;
}

/// Collaborator that allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

impl EnclaveAttestor for AlwaysAllow {
    fn validate(&self, _descriptor: &Descriptor) -> Verdict {
        Verdict::Allow
    }
}

impl RootOfTrust for AlwaysAllow {
    fn attest(&self, _descriptor: &Descriptor) -> Verdict {
        Verdict::Allow
    }
}

/// Runs only when [`Capabilities::SECURE_ENCLAVE`] is present.
pub struct EnclaveGate {
    attestor: Box<dyn EnclaveAttestor>,
}

impl EnclaveGate {
    /// Wrap an enclave collaborator.
    pub fn new(attestor: Box<dyn EnclaveAttestor>) -> Self {
        Self { attestor }
    }
}

impl Gate for EnclaveGate {
    fn kind(&self) -> GateKind {
        GateKind::SecureEnclave
    }

    fn requires(&self) -> Capabilities {
        Capabilities::SECURE_ENCLAVE
    }

    fn check(&self, descriptor: &Descriptor) -> Verdict {
        self.attestor.validate(descriptor)
    }
}

/// Runs only when [`Capabilities::ATTESTATION_ROOT`] is present.
pub struct AttestationGate {
    root: Box<dyn RootOfTrust>,
}

impl AttestationGate {
    /// Wrap a root-of-trust collaborator.
    pub fn new(root: Box<dyn RootOfTrust>) -> Self {
        Self { root }
    }
}

impl Gate for AttestationGate {
    fn kind(&self) -> GateKind {
        GateKind::HardwareAttestation
    }

    fn requires(&self) -> Capabilities {
        Capabilities::ATTESTATION_ROOT
    }

    fn check(&self, descriptor: &Descriptor) -> Verdict {
        self.root.attest(descriptor)
    }
}
