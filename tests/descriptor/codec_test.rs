//! Descriptor decoding tests.

use capgate::descriptor::{
    ClassicalDescriptor, Descriptor, DescriptorError, DescriptorKind, MalformedReason,
    Performance, QuantumDescriptor, SecurityFlags, CLASSICAL_LEN, QUANTUM_LEN,
};
use capgate::integrity::ChecksumAlgorithm;

fn perf() -> Performance {
    Performance {
        exec_time_ms: 120,
        memory_mb: 64,
        output_kb: 2,
    }
}

fn classical_bytes() -> [u8; CLASSICAL_LEN] {
    ClassicalDescriptor::new(0xCAFE_F00D, SecurityFlags::NETWORK, perf())
        .sealed(ChecksumAlgorithm::Crc32)
        .to_bytes()
}

fn quantum_bytes() -> [u8; QUANTUM_LEN] {
    QuantumDescriptor::new(0x0102_0304, SecurityFlags::EXECUTION, perf(), [0xAB; 11]).to_bytes()
}

#[test]
fn rejects_every_unsupported_length() {
    for len in [0usize, 1, 23, 25, 31, 33, 64] {
        let buf = vec![0u8; len];
        assert_eq!(
            Descriptor::decode(&buf),
            Err(DescriptorError::Malformed(MalformedReason::Length { len })),
            "length {len}"
        );
    }
}

#[test]
fn classical_wire_layout_is_big_endian() {
    let bytes = classical_bytes();
    assert_eq!(&bytes[0..4], b"TCP\x02");
    assert_eq!(&bytes[4..8], &[0xCA, 0xFE, 0xF0, 0x0D]);
    assert_eq!(&bytes[8..12], &[0, 0, 0, 0x08]);
    assert_eq!(&bytes[12..14], &[0, 120]);
    assert_eq!(&bytes[14..16], &[0, 64]);
    assert_eq!(&bytes[16..18], &[0, 2]);
    assert_eq!(&bytes[18..22], &[0, 0, 0, 0]);
}

#[test]
fn decodes_classical_fields() {
    let decoded = Descriptor::decode(&classical_bytes()).expect("valid classical");
    assert_eq!(decoded.kind(), DescriptorKind::Classical);
    assert_eq!(decoded.command_hash(), 0xCAFE_F00D);
    assert_eq!(decoded.flags(), SecurityFlags::NETWORK);
    assert_eq!(decoded.performance(), perf());
    assert_eq!(decoded.to_bytes(), classical_bytes().to_vec());
}

#[test]
fn decodes_quantum_fields() {
    let bytes = quantum_bytes();
    assert_eq!(&bytes[0..4], b"TCPQ");
    assert_eq!(bytes[4], 3);

    match Descriptor::decode(&bytes).expect("valid quantum") {
        Descriptor::Quantum(q) => {
            assert_eq!(q.version, 3);
            assert_eq!(q.command_hash, 0x0102_0304);
            assert_eq!(q.flags, SecurityFlags::EXECUTION);
            assert_eq!(q.signature, [0xAB; 11]);
            assert_eq!(q.reserved, [0, 0]);
        }
        other => panic!("expected quantum, got {other:?}"),
    }
}

#[test]
fn wrong_magic_for_length_class() {
    let mut bytes = classical_bytes();
    bytes[3] = 0x03;
    assert_eq!(
        Descriptor::decode(&bytes),
        Err(DescriptorError::Malformed(MalformedReason::Magic {
            kind: DescriptorKind::Classical,
            found: 0x5443_5003,
        }))
    );

    // Quantum magic in a 24-byte buffer is still a classical magic error.
    let mut swapped = classical_bytes();
    swapped[0..4].copy_from_slice(b"TCPQ");
    assert!(matches!(
        Descriptor::decode(&swapped),
        Err(DescriptorError::Malformed(MalformedReason::Magic {
            kind: DescriptorKind::Classical,
            ..
        }))
    ));
}

#[test]
fn quantum_version_below_three_is_malformed() {
    for version in [0u8, 1, 2] {
        let mut bytes = quantum_bytes();
        bytes[4] = version;
        assert_eq!(
            Descriptor::decode(&bytes),
            Err(DescriptorError::Malformed(MalformedReason::Version { version }))
        );
    }

    let mut newer = quantum_bytes();
    newer[4] = 7;
    assert!(Descriptor::decode(&newer).is_ok());
}

#[test]
fn unknown_flag_bits_survive_decoding() {
    let mut bytes = quantum_bytes();
    bytes[9..13].copy_from_slice(&0x8000_0010u32.to_be_bytes());
    let decoded = Descriptor::decode(&bytes).expect("valid quantum");
    assert_eq!(decoded.flags().bits(), 0x8000_0010);
    assert!(decoded.flags().contains(SecurityFlags::EXECUTION));
}

#[test]
fn errors_render_their_cause() {
    let err = Descriptor::decode(&[0u8; 10]).expect_err("too short");
    assert_eq!(
        err.to_string(),
        "malformed descriptor: unsupported length 10 (expected 24 or 32)"
    );
}
