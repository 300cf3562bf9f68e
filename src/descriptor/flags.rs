//! Bit sets carried by descriptors: security flags, execution contexts, and
//! required privilege levels.
//!
//! Flags are independent bits. A descriptor may be Destructive and Network
//! and Critical all at once; nothing here enforces mutual exclusion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Risk flags attached to a descriptor or syscall record.
///
/// Descriptors carry these as a 32-bit field, syscall records as 16 bits.
/// Bits above [`SecurityFlags::PRIVILEGE_ESCALATION`] have no meaning today
/// but are preserved as-is.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct SecurityFlags(u32);

impl SecurityFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Operation is known to be harmless.
    pub const SAFE: Self = Self(1 << 0);
    /// Operation destroys data.
    pub const DESTRUCTIVE: Self = Self(1 << 1);
    /// Operation touches the filesystem.
    pub const FILESYSTEM: Self = Self(1 << 2);
    /// Operation touches the network.
    pub const NETWORK: Self = Self(1 << 3);
    /// Operation executes other programs.
    pub const EXECUTION: Self = Self(1 << 4);
    /// Operation is security critical and subject to escalation.
    pub const CRITICAL: Self = Self(1 << 5);
    /// Operation acts at kernel level.
    pub const KERNEL: Self = Self(1 << 6);
    /// Operation can raise the caller's privileges.
    pub const PRIVILEGE_ESCALATION: Self = Self(1 << 7);

    const NAMED: [(Self, &'static str); 8] = [
        (Self::SAFE, "safe"),
        (Self::DESTRUCTIVE, "destructive"),
        (Self::FILESYSTEM, "filesystem"),
        (Self::NETWORK, "network"),
        (Self::EXECUTION, "execution"),
        (Self::CRITICAL, "critical"),
        (Self::KERNEL, "kernel"),
        (Self::PRIVILEGE_ESCALATION, "privilege_escalation"),
    ];

    /// Wrap raw bits without masking.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// True if `self` and `other` share at least one bit.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Logical OR.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if no bits are set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Look up a single flag by its lowercase name (e.g. `"destructive"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::NAMED
            .iter()
            .find(|(_, n)| *n == wanted)
            .map(|(flag, _)| *flag)
    }

    /// Names of the known flags set in `self`, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, n)| *n)
            .collect()
    }
}

impl From<u16> for SecurityFlags {
    fn from(bits: u16) -> Self {
        Self(u32::from(bits))
    }
}

impl std::ops::BitOr for SecurityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for SecurityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for name in self.names() {
            set.entry(&name);
        }
        set.finish()
    }
}

impl fmt::Display for SecurityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Serialize for SecurityFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

impl<'de> Deserialize<'de> for SecurityFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names.iter().try_fold(Self::NONE, |acc, name| {
            Self::from_name(name)
                .map(|flag| acc.union(flag))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown security flag: {name}")))
        })
    }
}

/// Execution contexts in which an operation is valid.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct ContextMask(u8);

impl ContextMask {
    /// No context.
    pub const NONE: Self = Self(0);
    /// Unprivileged user process.
    pub const USER: Self = Self(0x01);
    /// Privileged (root) process.
    pub const ADMIN: Self = Self(0x02);
    /// Kernel context.
    pub const KERNEL: Self = Self(0x04);
    /// Namespace-isolated (containerized) process.
    pub const CONTAINER: Self = Self(0x08);
    /// User, Admin, and Kernel.
    pub const ALL: Self = Self(Self::USER.0 | Self::ADMIN.0 | Self::KERNEL.0);

    /// Wrap raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Logical OR.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if `self` and `other` share at least one context.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Names of the contexts set in `self`.
    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::USER, "user"),
            (Self::ADMIN, "admin"),
            (Self::KERNEL, "kernel"),
            (Self::CONTAINER, "container"),
        ]
        .into_iter()
        .filter(|(ctx, _)| self.intersects(*ctx))
        .map(|(_, name)| name)
        .collect()
    }
}

impl std::ops::BitOr for ContextMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for ContextMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for name in self.names() {
            set.entry(&name);
        }
        set.finish()
    }
}

impl Serialize for ContextMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

/// Privilege required to perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PrivilegeLevel {
    /// Any user.
    User = 0,
    /// Root.
    Root = 1,
    /// Kernel only.
    Kernel = 2,
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::User => "user",
            Self::Root => "root",
            Self::Kernel => "kernel",
        };
        f.write_str(label)
    }
}
