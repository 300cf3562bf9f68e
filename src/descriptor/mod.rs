//! Binary capability descriptors and their fixed wire layouts.
//!
//! Two variants exist and the buffer length alone selects between them:
//!
//! | Variant   | Length | Magic      |
//! |-----------|--------|------------|
//! | Classical | 24     | `TCP\x02`  |
//! | Quantum   | 32     | `TCPQ`     |
//!
//! All multi-byte fields are big-endian. Decoding never reads past a fixed
//! offset and has no variable-length fields.

pub mod flags;

use std::fmt;

use serde::Serialize;

use crate::integrity::ChecksumAlgorithm;

pub use flags::{ContextMask, PrivilegeLevel, SecurityFlags};

/// Wire length of a classical descriptor.
pub const CLASSICAL_LEN: usize = 24;
/// Wire length of a quantum-safe descriptor.
pub const QUANTUM_LEN: usize = 32;
/// Number of leading classical bytes covered by the checksum.
pub const CLASSICAL_CHECKSUM_SPAN: usize = 22;
/// Lowest quantum descriptor version that counts as quantum-safe.
pub const MIN_QUANTUM_VERSION: u8 = 3;

/// Magic for classical descriptors (`TCP\x02`).
pub const CLASSICAL_MAGIC: u32 = u32::from_be_bytes(*b"TCP\x02");
/// Magic for quantum-safe descriptors (`TCPQ`).
pub const QUANTUM_MAGIC: u32 = u32::from_be_bytes(*b"TCPQ");

/// Length of the truncated post-quantum signature snippet.
pub const SIGNATURE_LEN: usize = 11;

// Classical offsets.
const C_HASH: usize = 4;
const C_FLAGS: usize = 8;
const C_PERF: usize = 12;
const C_RESERVED: usize = 18;
const C_CHECKSUM: usize = 22;

// Quantum offsets.
const Q_VERSION: usize = 4;
const Q_HASH: usize = 5;
const Q_FLAGS: usize = 9;
const Q_PERF: usize = 13;
const Q_SIGNATURE: usize = 19;
const Q_RESERVED: usize = 30;

/// Which wire layout a descriptor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    /// 24-byte checksummed layout.
    Classical,
    /// 32-byte layout with a post-quantum signature snippet.
    Quantum,
}

impl DescriptorKind {
    /// Select the layout from a buffer length.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            CLASSICAL_LEN => Some(Self::Classical),
            QUANTUM_LEN => Some(Self::Quantum),
            _ => None,
        }
    }

    /// Wire length of this layout.
    pub fn wire_len(self) -> usize {
        match self {
            Self::Classical => CLASSICAL_LEN,
            Self::Quantum => QUANTUM_LEN,
        }
    }

    /// Expected magic for this layout.
    pub fn magic(self) -> u32 {
        match self {
            Self::Classical => CLASSICAL_MAGIC,
            Self::Quantum => QUANTUM_MAGIC,
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classical => f.write_str("classical"),
            Self::Quantum => f.write_str("quantum"),
        }
    }
}

/// Why a buffer could not be decoded as a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedReason {
    /// Length matches neither layout.
    #[error("unsupported length {len} (expected 24 or 32)")]
    Length {
        /// Length of the rejected buffer.
        len: usize,
    },

    /// Magic does not match the layout selected by length.
    #[error("bad magic 0x{found:08x} for {kind} descriptor")]
    Magic {
        /// Layout selected by length.
        kind: DescriptorKind,
        /// Magic actually present.
        found: u32,
    },

    /// Quantum descriptor below the quantum-safe version.
    #[error("version {version} is not quantum-safe (minimum {MIN_QUANTUM_VERSION})")]
    Version {
        /// Version byte actually present.
        version: u8,
    },
}

/// Which integrity check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityFailure {
    /// Stored checksum differs from the recomputed one.
    #[error("stored checksum 0x{stored:04x}, computed 0x{computed:04x}")]
    Checksum {
        /// Checksum carried in the descriptor.
        stored: u16,
        /// Checksum recomputed over the covered prefix.
        computed: u16,
    },

    /// The signature verifier rejected the post-quantum signature.
    #[error("post-quantum signature rejected")]
    Signature,
}

/// Hard rejections. Never retried and never implicitly allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// Wrong length, bad magic, or insufficient version.
    #[error("malformed descriptor: {0}")]
    Malformed(#[from] MalformedReason),

    /// Checksum or signature check failed.
    #[error("integrity violation: {0}")]
    IntegrityViolation(#[from] IntegrityFailure),
}

/// Performance telemetry packed into six bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub struct Performance {
    /// Typical execution time in milliseconds.
    pub exec_time_ms: u16,
    /// Typical memory use in megabytes.
    pub memory_mb: u16,
    /// Typical output size in kilobytes.
    pub output_kb: u16,
}

impl Performance {
    fn from_bytes(raw: [u8; 6]) -> Self {
        let [a, b, c, d, e, f] = raw;
        Self {
            exec_time_ms: u16::from_be_bytes([a, b]),
            memory_mb: u16::from_be_bytes([c, d]),
            output_kb: u16::from_be_bytes([e, f]),
        }
    }

    fn to_bytes(self) -> [u8; 6] {
        let [a, b] = self.exec_time_ms.to_be_bytes();
        let [c, d] = self.memory_mb.to_be_bytes();
        let [e, f] = self.output_kb.to_be_bytes();
        [a, b, c, d, e, f]
    }
}

/// 24-byte descriptor protected by a 16-bit checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClassicalDescriptor {
    /// Identifier of the described command.
    pub command_hash: u32,
    /// Risk flags.
    pub flags: SecurityFlags,
    /// Performance telemetry.
    pub performance: Performance,
    /// Reserved bytes, carried verbatim.
    pub reserved: [u8; 4],
    /// Checksum over the first [`CLASSICAL_CHECKSUM_SPAN`] bytes.
    pub checksum: u16,
}

impl ClassicalDescriptor {
    /// Build an unsealed descriptor (checksum zero).
    pub fn new(command_hash: u32, flags: SecurityFlags, performance: Performance) -> Self {
        Self {
            command_hash,
            flags,
            performance,
            reserved: [0; 4],
            checksum: 0,
        }
    }

    /// Return a copy whose checksum is computed with `algorithm`.
    #[must_use]
    pub fn sealed(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum = algorithm.compute(&self.checksummed_prefix());
        self
    }

    /// The bytes covered by the checksum.
    pub fn checksummed_prefix(&self) -> [u8; CLASSICAL_CHECKSUM_SPAN] {
        let bytes = self.to_bytes();
        field(&bytes, 0)
    }

    /// Encode to wire bytes, writing the stored checksum as-is.
    pub fn to_bytes(&self) -> [u8; CLASSICAL_LEN] {
        let mut out = [0u8; CLASSICAL_LEN];
        put(&mut out, 0, &CLASSICAL_MAGIC.to_be_bytes());
        put(&mut out, C_HASH, &self.command_hash.to_be_bytes());
        put(&mut out, C_FLAGS, &self.flags.bits().to_be_bytes());
        put(&mut out, C_PERF, &self.performance.to_bytes());
        put(&mut out, C_RESERVED, &self.reserved);
        put(&mut out, C_CHECKSUM, &self.checksum.to_be_bytes());
        out
    }

    fn decode(raw: &[u8]) -> Result<Self, DescriptorError> {
        let magic = u32::from_be_bytes(field(raw, 0));
        if magic != CLASSICAL_MAGIC {
            return Err(MalformedReason::Magic {
                kind: DescriptorKind::Classical,
                found: magic,
            }
            .into());
        }
        Ok(Self {
            command_hash: u32::from_be_bytes(field(raw, C_HASH)),
            flags: SecurityFlags::from_bits(u32::from_be_bytes(field(raw, C_FLAGS))),
            performance: Performance::from_bytes(field(raw, C_PERF)),
            reserved: field(raw, C_RESERVED),
            checksum: u16::from_be_bytes(field(raw, C_CHECKSUM)),
        })
    }
}

/// 32-byte descriptor carrying a truncated post-quantum signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QuantumDescriptor {
    /// Format version; at least [`MIN_QUANTUM_VERSION`].
    pub version: u8,
    /// Identifier of the described command.
    pub command_hash: u32,
    /// Risk flags.
    pub flags: SecurityFlags,
    /// Performance telemetry.
    pub performance: Performance,
    /// Truncated post-quantum signature.
    pub signature: [u8; SIGNATURE_LEN],
    /// Reserved bytes, carried verbatim.
    pub reserved: [u8; 2],
}

impl QuantumDescriptor {
    /// Build a descriptor at the minimum quantum-safe version.
    pub fn new(
        command_hash: u32,
        flags: SecurityFlags,
        performance: Performance,
        signature: [u8; SIGNATURE_LEN],
    ) -> Self {
        Self {
            version: MIN_QUANTUM_VERSION,
            command_hash,
            flags,
            performance,
            signature,
            reserved: [0; 2],
        }
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> [u8; QUANTUM_LEN] {
        let mut out = [0u8; QUANTUM_LEN];
        put(&mut out, 0, &QUANTUM_MAGIC.to_be_bytes());
        put(&mut out, Q_VERSION, &[self.version]);
        put(&mut out, Q_HASH, &self.command_hash.to_be_bytes());
        put(&mut out, Q_FLAGS, &self.flags.bits().to_be_bytes());
        put(&mut out, Q_PERF, &self.performance.to_bytes());
        put(&mut out, Q_SIGNATURE, &self.signature);
        put(&mut out, Q_RESERVED, &self.reserved);
        out
    }

    fn decode(raw: &[u8]) -> Result<Self, DescriptorError> {
        let magic = u32::from_be_bytes(field(raw, 0));
        if magic != QUANTUM_MAGIC {
            return Err(MalformedReason::Magic {
                kind: DescriptorKind::Quantum,
                found: magic,
            }
            .into());
        }
        let [version] = field(raw, Q_VERSION);
        if version < MIN_QUANTUM_VERSION {
            return Err(MalformedReason::Version { version }.into());
        }
        Ok(Self {
            version,
            command_hash: u32::from_be_bytes(field(raw, Q_HASH)),
            flags: SecurityFlags::from_bits(u32::from_be_bytes(field(raw, Q_FLAGS))),
            performance: Performance::from_bytes(field(raw, Q_PERF)),
            signature: field(raw, Q_SIGNATURE),
            reserved: field(raw, Q_RESERVED),
        })
    }
}

/// A decoded descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Descriptor {
    /// 24-byte layout.
    Classical(ClassicalDescriptor),
    /// 32-byte layout.
    Quantum(QuantumDescriptor),
}

impl Descriptor {
    /// Decode a raw buffer.
    ///
    /// Any length other than 24 or 32 fails before a single field is read.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Malformed`] for a wrong length, a magic
    /// mismatch, or a quantum version below [`MIN_QUANTUM_VERSION`].
    pub fn decode(bytes: &[u8]) -> Result<Self, DescriptorError> {
        match DescriptorKind::from_len(bytes.len()) {
            Some(DescriptorKind::Classical) => ClassicalDescriptor::decode(bytes).map(Self::Classical),
            Some(DescriptorKind::Quantum) => QuantumDescriptor::decode(bytes).map(Self::Quantum),
            None => Err(MalformedReason::Length { len: bytes.len() }.into()),
        }
    }

    /// Layout of this descriptor.
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Classical(_) => DescriptorKind::Classical,
            Self::Quantum(_) => DescriptorKind::Quantum,
        }
    }

    /// Risk flags.
    pub fn flags(&self) -> SecurityFlags {
        match self {
            Self::Classical(d) => d.flags,
            Self::Quantum(d) => d.flags,
        }
    }

    /// Identifier of the described command.
    pub fn command_hash(&self) -> u32 {
        match self {
            Self::Classical(d) => d.command_hash,
            Self::Quantum(d) => d.command_hash,
        }
    }

    /// Performance telemetry.
    pub fn performance(&self) -> Performance {
        match self {
            Self::Classical(d) => d.performance,
            Self::Quantum(d) => d.performance,
        }
    }

    /// Encode back to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Classical(d) => d.to_bytes().to_vec(),
            Self::Quantum(d) => d.to_bytes().to_vec(),
        }
    }
}

/// Copy `N` bytes starting at `start`. Out-of-range reads yield zeros; callers
/// only pass offsets inside a length-checked buffer.
fn field<const N: usize>(raw: &[u8], start: usize) -> [u8; N] {
    let mut out = [0u8; N];
    if let Some(src) = raw.get(start..start.saturating_add(N)) {
        out.copy_from_slice(src);
    }
    out
}

fn put(out: &mut [u8], start: usize, src: &[u8]) {
    if let Some(dst) = out.get_mut(start..start.saturating_add(src.len())) {
        dst.copy_from_slice(src);
    }
}
