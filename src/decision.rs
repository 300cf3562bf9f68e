//! Evaluation outcomes shared by the descriptor and syscall paths.

use std::fmt;

use serde::Serialize;

use crate::descriptor::{ContextMask, DescriptorError};
use crate::syscall::SecurityLevel;

/// Stage of the gate pipeline, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Flag-based policy check.
    Policy,
    /// Behavioral heuristic.
    BehaviorMonitor,
    /// Secure enclave validation.
    SecureEnclave,
    /// Hardware root-of-trust attestation.
    HardwareAttestation,
}

impl GateKind {
    /// All gates in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::Policy,
        Self::BehaviorMonitor,
        Self::SecureEnclave,
        Self::HardwareAttestation,
    ];

    /// Position in the pipeline.
    pub fn index(self) -> usize {
        match self {
            Self::Policy => 0,
            Self::BehaviorMonitor => 1,
            Self::SecureEnclave => 2,
            Self::HardwareAttestation => 3,
        }
    }

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::BehaviorMonitor => "behavior_monitor",
            Self::SecureEnclave => "secure_enclave",
            Self::HardwareAttestation => "hardware_attestation",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an operation was denied. Denials are normal outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A pipeline gate vetoed the descriptor.
    GateVeto {
        /// The gate that vetoed.
        gate: GateKind,
    },

    /// A gate's collaborator had no verdict ready; treated as a veto.
    GateTimeout {
        /// The gate whose verdict was pending.
        gate: GateKind,
    },

    /// The caller's context is not among the operation's valid contexts.
    ContextMismatch {
        /// Contexts the operation allows.
        allowed: ContextMask,
        /// Contexts the caller is in.
        caller: ContextMask,
    },

    /// A critical operation from an unprivileged caller at an elevated level.
    CriticalEscalation {
        /// Security level in force.
        level: SecurityLevel,
    },
}

impl DenyReason {
    /// The pipeline gate responsible, if any.
    pub fn gate(&self) -> Option<GateKind> {
        match self {
            Self::GateVeto { gate } | Self::GateTimeout { gate } => Some(*gate),
            Self::ContextMismatch { .. } | Self::CriticalEscalation { .. } => None,
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GateVeto { gate } => write!(f, "{gate} gate vetoed"),
            Self::GateTimeout { gate } => write!(f, "{gate} gate verdict not available"),
            Self::ContextMismatch { allowed, caller } => {
                write!(f, "caller context {caller:?} not in {allowed:?}")
            }
            Self::CriticalEscalation { level } => {
                write!(f, "critical operation from unprivileged caller at level {level}")
            }
        }
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Operation may proceed.
    Allow,
    /// Operation is denied.
    Deny(DenyReason),
    /// Descriptor was rejected before any policy ran. The host decides
    /// whether this fails open or closed; the core never treats it as allow.
    Error(DescriptorError),
}

impl Decision {
    /// True only for [`Decision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny(reason) => write!(f, "deny: {reason}"),
            Self::Error(err) => write!(f, "error: {err}"),
        }
    }
}
