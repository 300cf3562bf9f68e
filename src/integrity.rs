//! Integrity verification for decoded descriptors.
//!
//! Classical descriptors carry a 16-bit checksum over their first 22 bytes.
//! Quantum descriptors carry a truncated post-quantum signature whose
//! verification is delegated to a [`SignatureVerifier`]. No real verifier
//! ships with this crate: [`UnverifiedSignatures`] accepts everything and
//! exists so hosts can plug in a real one.

use serde::Deserialize;

use crate::descriptor::{
    ClassicalDescriptor, Descriptor, DescriptorError, IntegrityFailure, QuantumDescriptor,
};

/// Checksum used for classical descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumAlgorithm {
    /// CRC-32 (IEEE), truncated to its low 16 bits.
    #[default]
    Crc32,
    /// Wrapping byte sum, low 16 bits.
    ByteSum,
}

impl ChecksumAlgorithm {
    /// Compute the 16-bit checksum of `data`.
    ///
    /// `Crc32` is order-sensitive. `ByteSum` does not notice swapped bytes
    /// and is kept only for generators that still emit it.
    pub fn compute(self, data: &[u8]) -> u16 {
        match self {
            Self::Crc32 => {
                let [lo, hi, _, _] = crc32fast::hash(data).to_le_bytes();
                u16::from_le_bytes([lo, hi])
            }
            Self::ByteSum => data
                .iter()
                .fold(0u16, |acc, byte| acc.wrapping_add(u16::from(*byte))),
        }
    }
}

/// Verifies the post-quantum signature snippet of a quantum descriptor.
pub trait SignatureVerifier: Send + Sync {
    /// Return `true` if the signature is acceptable.
    fn verify(&self, descriptor: &QuantumDescriptor) -> bool;
}

/// Accepts every signature. Placeholder until a real verifier is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedSignatures;

impl SignatureVerifier for UnverifiedSignatures {
    fn verify(&self, _descriptor: &QuantumDescriptor) -> bool {
        true
    }
}

/// Integrity verifier combining the checksum algorithm and signature verifier.
pub struct Integrity {
    algorithm: ChecksumAlgorithm,
    signatures: Box<dyn SignatureVerifier>,
}

impl Integrity {
    /// Create a verifier.
    pub fn new(algorithm: ChecksumAlgorithm, signatures: Box<dyn SignatureVerifier>) -> Self {
        Self {
            algorithm,
            signatures,
        }
    }

    /// Checksum algorithm in use.
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Verify a decoded descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::IntegrityViolation`] on a checksum mismatch
    /// or a rejected signature.
    pub fn verify(&self, descriptor: &Descriptor) -> Result<(), DescriptorError> {
        match descriptor {
            Descriptor::Classical(d) => self.verify_checksum(d),
            Descriptor::Quantum(d) => {
                if self.signatures.verify(d) {
                    Ok(())
                } else {
                    Err(IntegrityFailure::Signature.into())
                }
            }
        }
    }

    fn verify_checksum(&self, descriptor: &ClassicalDescriptor) -> Result<(), DescriptorError> {
        let computed = self.algorithm.compute(&descriptor.checksummed_prefix());
        if computed == descriptor.checksum {
            Ok(())
        } else {
            Err(IntegrityFailure::Checksum {
                stored: descriptor.checksum,
                computed,
            }
            .into())
        }
    }
}

impl Default for Integrity {
    fn default() -> Self {
        Self::new(ChecksumAlgorithm::default(), Box::new(UnverifiedSignatures))
    }
}

impl std::fmt::Debug for Integrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrity")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
