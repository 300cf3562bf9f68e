//! Integrity verifier tests.

use capgate::descriptor::{
    ClassicalDescriptor, Descriptor, DescriptorError, IntegrityFailure, Performance,
    QuantumDescriptor, SecurityFlags,
};
use capgate::integrity::{ChecksumAlgorithm, Integrity, SignatureVerifier, UnverifiedSignatures};

struct RejectAll;

impl SignatureVerifier for RejectAll {
    fn verify(&self, _descriptor: &QuantumDescriptor) -> bool {
        false
    }
}

fn sealed(algorithm: ChecksumAlgorithm) -> ClassicalDescriptor {
    ClassicalDescriptor::new(42, SecurityFlags::FILESYSTEM, Performance::default())
        .sealed(algorithm)
}

fn decode(bytes: &[u8]) -> Descriptor {
    Descriptor::decode(bytes).expect("well-formed descriptor")
}

#[test]
fn sealed_descriptor_verifies() {
    let integrity = Integrity::default();
    let d = decode(&sealed(ChecksumAlgorithm::Crc32).to_bytes());
    assert!(integrity.verify(&d).is_ok());
}

#[test]
fn corrupted_checksum_is_an_integrity_violation() {
    let integrity = Integrity::default();
    let mut bytes = sealed(ChecksumAlgorithm::Crc32).to_bytes();
    bytes[23] ^= 0xFF;
    let err = integrity.verify(&decode(&bytes)).expect_err("tampered");
    assert!(matches!(
        err,
        DescriptorError::IntegrityViolation(IntegrityFailure::Checksum { .. })
    ));
}

#[test]
fn corrupted_covered_byte_is_an_integrity_violation() {
    let integrity = Integrity::default();
    let mut bytes = sealed(ChecksumAlgorithm::Crc32).to_bytes();
    bytes[19] = 0x55;
    assert!(integrity.verify(&decode(&bytes)).is_err());
}

#[test]
fn crc_catches_swapped_bytes_that_byte_sum_misses() {
    let mut d = ClassicalDescriptor::new(0x0102_0304, SecurityFlags::NONE, Performance::default());
    let original = d.checksummed_prefix();
    d.command_hash = 0x0201_0304;
    let swapped = d.checksummed_prefix();

    assert_eq!(
        ChecksumAlgorithm::ByteSum.compute(&original),
        ChecksumAlgorithm::ByteSum.compute(&swapped)
    );
    assert_ne!(
        ChecksumAlgorithm::Crc32.compute(&original),
        ChecksumAlgorithm::Crc32.compute(&swapped)
    );
}

#[test]
fn algorithm_mismatch_fails_verification() {
    let bytes = sealed(ChecksumAlgorithm::ByteSum).to_bytes();
    let crc = Integrity::new(ChecksumAlgorithm::Crc32, Box::new(UnverifiedSignatures));
    let sum = Integrity::new(ChecksumAlgorithm::ByteSum, Box::new(UnverifiedSignatures));
    assert!(sum.verify(&decode(&bytes)).is_ok());
    assert!(crc.verify(&decode(&bytes)).is_err());
}

#[test]
fn byte_sum_matches_low_sixteen_bits_of_sum() {
    let data = [0xFFu8; 300];
    // 300 * 255 = 76_500, minus 65_536.
    let expected: u16 = 10_964;
    assert_eq!(ChecksumAlgorithm::ByteSum.compute(&data), expected);
}

#[test]
fn signature_verifier_decides_quantum_integrity() {
    let q = QuantumDescriptor::new(1, SecurityFlags::SAFE, Performance::default(), [0; 11]);
    let d = decode(&q.to_bytes());

    assert!(Integrity::default().verify(&d).is_ok());

    let strict = Integrity::new(ChecksumAlgorithm::Crc32, Box::new(RejectAll));
    assert_eq!(
        strict.verify(&d),
        Err(DescriptorError::IntegrityViolation(IntegrityFailure::Signature))
    );
}
