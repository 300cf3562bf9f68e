//! Capability inventory: which optional gates the host can back.
//!
//! Computed once when the engine is built and never mutated afterwards.
//! Gates consult it to decide whether to run or auto-pass.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Set of optional subsystems available on this host.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct Capabilities(u32);

impl Capabilities {
    /// Nothing available.
    pub const NONE: Self = Self(0);
    /// Security policy hooks.
    pub const POLICY_HOOKS: Self = Self(1 << 0);
    /// In-kernel behavioral monitor.
    pub const BEHAVIOR_MONITOR: Self = Self(1 << 1);
    /// Hardware performance counters.
    pub const PERF_COUNTERS: Self = Self(1 << 2);
    /// Hardware root of trust for attestation.
    pub const ATTESTATION_ROOT: Self = Self(1 << 3);
    /// Secure enclave.
    pub const SECURE_ENCLAVE: Self = Self(1 << 4);
    /// Control-flow integrity enforcement.
    pub const CONTROL_FLOW_INTEGRITY: Self = Self(1 << 5);
    /// Hardware execution tracing.
    pub const EXECUTION_TRACING: Self = Self(1 << 6);
    /// Memory protection domains.
    pub const MEMORY_DOMAINS: Self = Self(1 << 7);

    /// Subsystems every supported host provides.
    pub const BASELINE: Self =
        Self(Self::POLICY_HOOKS.0 | Self::BEHAVIOR_MONITOR.0 | Self::PERF_COUNTERS.0);

    /// Every known capability.
    pub const ALL: Self = Self(0xFF);

    const NAMED: [(Self, &'static str); 8] = [
        (Self::POLICY_HOOKS, "policy_hooks"),
        (Self::BEHAVIOR_MONITOR, "behavior_monitor"),
        (Self::PERF_COUNTERS, "perf_counters"),
        (Self::ATTESTATION_ROOT, "attestation_root"),
        (Self::SECURE_ENCLAVE, "secure_enclave"),
        (Self::CONTROL_FLOW_INTEGRITY, "control_flow_integrity"),
        (Self::EXECUTION_TRACING, "execution_tracing"),
        (Self::MEMORY_DOMAINS, "memory_domains"),
    ];

    /// Wrap raw bits, dropping unknown ones.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is available.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Logical OR.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `self` without the bits of `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Look up a capability by name (e.g. `"secure_enclave"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::NAMED
            .iter()
            .find(|(_, n)| *n == wanted)
            .map(|(cap, _)| *cap)
    }

    /// Names of the available capabilities, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(cap, _)| self.contains(*cap))
            .map(|(_, n)| *n)
            .collect()
    }

    /// Derive the inventory from `/proc/cpuinfo` flag words and TPM presence.
    ///
    /// Baseline subsystems are always included.
    pub fn from_cpu_flags(cpu_flags: &str, tpm_present: bool) -> Self {
        let mut caps = Self::BASELINE;
        let has = |flag: &str| cpu_flags.split_whitespace().any(|f| f == flag);

        if has("sgx") {
            caps = caps.union(Self::SECURE_ENCLAVE);
        }
        if has("shstk") || has("user_shstk") || has("ibt") {
            caps = caps.union(Self::CONTROL_FLOW_INTEGRITY);
        }
        if has("intel_pt") {
            caps = caps.union(Self::EXECUTION_TRACING);
        }
        if has("pku") {
            caps = caps.union(Self::MEMORY_DOMAINS);
        }
        if tpm_present {
            caps = caps.union(Self::ATTESTATION_ROOT);
        }
        caps
    }

    /// Probe the running host.
    ///
    /// Missing or unreadable probe files mean the capability is absent.
    pub fn detect() -> Self {
        let cpu_flags = std::fs::read_to_string("/proc/cpuinfo")
            .map(|info| {
                info.lines()
                    .find(|line| line.starts_with("flags"))
                    .and_then(|line| line.split_once(':'))
                    .map(|(_, flags)| flags.to_owned())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let tpm_present = ["/dev/tpm0", "/dev/tpmrm0", "/sys/class/tpm/tpm0"]
            .iter()
            .any(|p| Path::new(p).exists());

        let caps = Self::from_cpu_flags(&cpu_flags, tpm_present);
        tracing::debug!(capabilities = ?caps, "host capabilities detected");
        caps
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for name in self.names() {
            set.entry(&name);
        }
        set.finish()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

impl<'de> Deserialize<'de> for Capabilities {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names.iter().try_fold(Self::NONE, |acc, name| {
            Self::from_name(name)
                .map(|cap| acc.union(cap))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown capability: {name}")))
        })
    }
}
