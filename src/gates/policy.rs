//! Flag policy and behavioral heuristic gates.

use crate::decision::GateKind;
use crate::descriptor::{Descriptor, SecurityFlags};
use crate::inventory::Capabilities;

use super::{Gate, Verdict};

/// Denies descriptors carrying any of the configured flags.
///
/// The default policy denies [`SecurityFlags::DESTRUCTIVE`].
#[derive(Debug, Clone, Copy)]
pub struct PolicyGate {
    deny_flags: SecurityFlags,
}

impl PolicyGate {
    /// Deny any descriptor whose flags intersect `deny_flags`.
    pub fn new(deny_flags: SecurityFlags) -> Self {
        Self { deny_flags }
    }
}

impl Default for PolicyGate {
    fn default() -> Self {
        Self::new(SecurityFlags::DESTRUCTIVE)
    }
}

impl Gate for PolicyGate {
    fn kind(&self) -> GateKind {
        GateKind::Policy
    }

    fn requires(&self) -> Capabilities {
        Capabilities::POLICY_HOOKS
    }

    fn check(&self, descriptor: &Descriptor) -> Verdict {
        if descriptor.flags().intersects(self.deny_flags) {
            Verdict::Deny
        } else {
            Verdict::Allow
        }
    }
}

/// Fast heuristic keyed on the descriptor's length class.
///
/// Every decoded descriptor has a known length class today, so this gate
/// passes; deeper behavioral inspection hooks in here.
#[derive(Debug, Clone, Copy, Default)]
pub struct BehaviorGate;

impl Gate for BehaviorGate {
    fn kind(&self) -> GateKind {
        GateKind::BehaviorMonitor
    }

    fn requires(&self) -> Capabilities {
        Capabilities::BEHAVIOR_MONITOR
    }

    fn check(&self, descriptor: &Descriptor) -> Verdict {
        match descriptor.kind().wire_len() {
            crate::descriptor::CLASSICAL_LEN | crate::descriptor::QUANTUM_LEN => Verdict::Allow,
            _ => Verdict::Deny,
        }
    }
}
