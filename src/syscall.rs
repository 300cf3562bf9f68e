//! Syscall descriptor registry and context evaluator.
//!
//! A small static table keyed by syscall number plus a fixed decision
//! table. Nothing persists between calls.
//!
//! Unknown syscalls are allowed (fail-open). Hosts that want fail-closed
//! behavior must register every syscall they care about.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decision::{Decision, DenyReason};
use crate::descriptor::{ContextMask, PrivilegeLevel, SecurityFlags};
use crate::stats::Statistics;

/// Highest accepted security level.
pub const MAX_SECURITY_LEVEL: u8 = 6;

/// Level from which critical operations by unprivileged callers are denied.
pub const ESCALATION_LEVEL: u8 = 2;

/// Longest pattern label, in bytes.
pub const MAX_PATTERN_LEN: usize = 31;

/// x86-64 syscall numbers used by the built-in table.
pub mod nr {
    /// `getpid`
    pub const GETPID: i32 = 39;
    /// `execve`
    pub const EXECVE: i32 = 59;
    /// `unlink`
    pub const UNLINK: i32 = 87;
    /// `init_module`
    pub const INIT_MODULE: i32 = 175;
}

/// Security level outside `0..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("security level {0} out of range 0..={MAX_SECURITY_LEVEL}")]
pub struct SecurityLevelError(pub u8);

/// How aggressively critical operations escalate to denial (0..=6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    /// Most permissive level.
    pub const MIN: Self = Self(0);
    /// Normal level.
    pub const NORMAL: Self = Self(1);
    /// Most aggressive level.
    pub const MAX: Self = Self(MAX_SECURITY_LEVEL);

    /// Validate a raw level.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityLevelError`] if `level > 6`.
    pub fn new(level: u8) -> Result<Self, SecurityLevelError> {
        if level > MAX_SECURITY_LEVEL {
            return Err(SecurityLevelError(level));
        }
        Ok(Self(level))
    }

    /// Raw level.
    pub fn get(self) -> u8 {
        self.0
    }

    /// True if critical operations from unprivileged callers are denied.
    pub fn escalates_critical(self) -> bool {
        self.0 >= ESCALATION_LEVEL
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = SecurityLevelError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the calling process, already resolved by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallerContext {
    /// Caller runs as root.
    pub privileged: bool,
    /// Caller is in a non-initial namespace set.
    pub isolated: bool,
}

impl CallerContext {
    /// Unprivileged, non-isolated caller.
    pub const USER: Self = Self {
        privileged: false,
        isolated: false,
    };

    /// Privileged, non-isolated caller.
    pub const ROOT: Self = Self {
        privileged: true,
        isolated: false,
    };

    /// The caller's current context bits.
    pub fn mask(self) -> ContextMask {
        let identity = if self.privileged {
            ContextMask::ADMIN
        } else {
            ContextMask::USER
        };
        if self.isolated {
            identity.union(ContextMask::CONTAINER)
        } else {
            identity
        }
    }
}

/// Invalid registry input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Pattern label longer than [`MAX_PATTERN_LEN`].
    #[error("pattern '{pattern}' is {len} bytes (max {MAX_PATTERN_LEN})")]
    PatternTooLong {
        /// Offending label.
        pattern: String,
        /// Its length in bytes.
        len: usize,
    },

    /// Two records share a syscall number.
    #[error("duplicate record for syscall {op_id}")]
    DuplicateOp {
        /// Repeated syscall number.
        op_id: i32,
    },
}

/// Risk profile of one syscall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyscallRecord {
    /// Syscall number.
    pub op_id: i32,
    /// Risk flags (16 significant bits).
    pub flags: SecurityFlags,
    /// Contexts in which the call is valid.
    pub contexts: ContextMask,
    /// Privilege the call nominally requires.
    pub privilege: PrivilegeLevel,
    pattern: String,
    /// Integrity value of the record.
    pub checksum: u32,
}

impl SyscallRecord {
    /// Build a record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::PatternTooLong`] for labels over
    /// [`MAX_PATTERN_LEN`] bytes.
    pub fn new(
        op_id: i32,
        flags: u16,
        contexts: ContextMask,
        privilege: PrivilegeLevel,
        pattern: &str,
        checksum: u32,
    ) -> Result<Self, RecordError> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(RecordError::PatternTooLong {
                pattern: pattern.to_owned(),
                len: pattern.len(),
            });
        }
        Ok(Self {
            op_id,
            flags: SecurityFlags::from(flags),
            contexts,
            privilege,
            pattern: pattern.to_owned(),
            checksum,
        })
    }

    /// Human-readable operation label.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Syscall table with O(1) lookup by number.
#[derive(Debug, Clone)]
pub struct SyscallRegistry {
    records: Vec<SyscallRecord>,
    index: HashMap<i32, usize>,
}

impl SyscallRegistry {
    /// Build a registry from records.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::DuplicateOp`] if two records share a number.
    pub fn from_records(records: Vec<SyscallRecord>) -> Result<Self, RecordError> {
        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if index.insert(record.op_id, position).is_some() {
                return Err(RecordError::DuplicateOp {
                    op_id: record.op_id,
                });
            }
        }
        Ok(Self { records, index })
    }

    /// The built-in four-entry table.
    pub fn builtin() -> Self {
        let record = |op_id, flags: SecurityFlags, contexts, privilege, pattern: &str, checksum| {
            SyscallRecord {
                op_id,
                flags,
                contexts,
                privilege,
                pattern: pattern.to_owned(),
                checksum,
            }
        };
        let records = vec![
            record(
                nr::UNLINK,
                SecurityFlags::DESTRUCTIVE | SecurityFlags::FILESYSTEM,
                ContextMask::USER | ContextMask::ADMIN,
                PrivilegeLevel::User,
                "file_deletion",
                0x1A2B_3C4D,
            ),
            record(
                nr::EXECVE,
                SecurityFlags::EXECUTION | SecurityFlags::CRITICAL,
                ContextMask::ALL,
                PrivilegeLevel::User,
                "program_exec",
                0x5E6F_7890,
            ),
            record(
                nr::INIT_MODULE,
                SecurityFlags::CRITICAL | SecurityFlags::KERNEL | SecurityFlags::DESTRUCTIVE,
                ContextMask::ADMIN | ContextMask::KERNEL,
                PrivilegeLevel::Root,
                "module_load",
                0x9ABC_1234,
            ),
            record(
                nr::GETPID,
                SecurityFlags::SAFE,
                ContextMask::ALL,
                PrivilegeLevel::User,
                "pid_query",
                0xDEF5_6789,
            ),
        ];
        let index = records
            .iter()
            .enumerate()
            .map(|(position, r)| (r.op_id, position))
            .collect();
        Self { records, index }
    }

    /// Record for `op_id`.
    pub fn get(&self, op_id: i32) -> Option<&SyscallRecord> {
        self.index.get(&op_id).and_then(|&i| self.records.get(i))
    }

    /// All records in table order.
    pub fn records(&self) -> &[SyscallRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decide whether `caller` may perform `op_id` at `level`.
    ///
    /// Decision table, first match wins:
    ///
    /// | Condition                                   | Result | Counter             |
    /// |---------------------------------------------|--------|---------------------|
    /// | unknown `op_id`                             | Allow  | `fast_path_hits`    |
    /// | Safe flag                                   | Allow  | `fast_path_hits`    |
    /// | caller context ∩ record contexts = ∅        | Deny   | `blocked_operations`|
    /// | Critical, level ≥ 2, unprivileged           | Deny   | `blocked_operations`|
    /// | otherwise                                   | Allow  |                     |
    ///
    /// Critical and Destructive flags each record a security event when
    /// reached.
    pub fn evaluate(
        &self,
        stats: &Statistics,
        op_id: i32,
        caller: CallerContext,
        level: SecurityLevel,
    ) -> Decision {
        stats.record_syscall_check();

        let Some(record) = self.get(op_id) else {
            stats.record_fast_path();
            return Decision::Allow;
        };

        if record.flags.contains(SecurityFlags::SAFE) {
            stats.record_fast_path();
            return Decision::Allow;
        }

        let current = caller.mask();
        if !record.contexts.intersects(current) {
            warn!(
                op_id,
                pattern = record.pattern(),
                caller = ?current,
                allowed = ?record.contexts,
                "invalid context for syscall"
            );
            stats.record_blocked();
            return Decision::Deny(DenyReason::ContextMismatch {
                allowed: record.contexts,
                caller: current,
            });
        }

        if record.flags.contains(SecurityFlags::CRITICAL) {
            info!(op_id, pattern = record.pattern(), "critical operation detected");
            stats.record_security_event();

            if level.escalates_critical() && !caller.privileged {
                warn!(op_id, %level, "blocking critical operation from unprivileged caller");
                stats.record_blocked();
                return Decision::Deny(DenyReason::CriticalEscalation { level });
            }
        }

        if record.flags.contains(SecurityFlags::DESTRUCTIVE) {
            info!(op_id, pattern = record.pattern(), "destructive operation");
            stats.record_security_event();
        }

        Decision::Allow
    }
}

impl Default for SyscallRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
