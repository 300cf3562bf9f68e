//! Gate pipeline tests.

use capgate::config::CapgateConfig;
use capgate::descriptor::{DescriptorError, MalformedReason, SecurityFlags};
use capgate::gates::Verdict;
use capgate::inventory::Capabilities;
use capgate::{Decision, DenyReason, Engine, GateKind};

use crate::support::{classical, engine, quantum, Scripted};

fn full() -> Capabilities {
    Capabilities::BASELINE
        .union(Capabilities::SECURE_ENCLAVE)
        .union(Capabilities::ATTESTATION_ROOT)
}

#[test]
fn benign_descriptor_is_allowed() {
    let engine = engine(Capabilities::BASELINE);
    assert_eq!(
        engine.evaluate_descriptor(&classical(1, SecurityFlags::NETWORK)),
        Decision::Allow
    );
    assert_eq!(
        engine.evaluate_descriptor(&quantum(2, SecurityFlags::EXECUTION)),
        Decision::Allow
    );
}

#[test]
fn policy_denies_destructive_in_both_layouts() {
    let engine = engine(Capabilities::BASELINE);
    let veto = Decision::Deny(DenyReason::GateVeto {
        gate: GateKind::Policy,
    });
    assert_eq!(
        engine.evaluate_descriptor(&classical(1, SecurityFlags::DESTRUCTIVE)),
        veto
    );
    assert_eq!(
        engine.evaluate_descriptor(&quantum(1, SecurityFlags::DESTRUCTIVE | SecurityFlags::NETWORK)),
        veto
    );

    let stats = engine.snapshot_statistics();
    assert_eq!(stats.denials_by_gate.get("policy"), Some(&2));
    assert_eq!(stats.security_violations, 2);
}

#[test]
fn configured_deny_flags_replace_the_default() {
    let mut config = CapgateConfig::default();
    config.policy.deny_flags = SecurityFlags::NETWORK;
    let engine = Engine::builder(config)
        .capabilities(Capabilities::BASELINE)
        .build();

    assert!(engine
        .evaluate_descriptor(&classical(1, SecurityFlags::DESTRUCTIVE))
        .is_allowed());
    assert!(!engine
        .evaluate_descriptor(&classical(2, SecurityFlags::NETWORK))
        .is_allowed());
}

#[test]
fn policy_gate_auto_passes_without_hooks() {
    let engine = engine(Capabilities::NONE);
    assert_eq!(
        engine.evaluate_descriptor(&classical(1, SecurityFlags::DESTRUCTIVE)),
        Decision::Allow
    );
}

#[test]
fn enclave_is_consulted_only_when_present() {
    let enclave = Scripted::new(Verdict::Deny);

    let without = Engine::builder(CapgateConfig::default())
        .capabilities(Capabilities::BASELINE)
        .enclave(Box::new(enclave.clone()))
        .build();
    assert!(without
        .evaluate_descriptor(&classical(1, SecurityFlags::NETWORK))
        .is_allowed());
    assert_eq!(enclave.calls(), 0);

    let with = Engine::builder(CapgateConfig::default())
        .capabilities(full())
        .enclave(Box::new(enclave.clone()))
        .build();
    assert_eq!(
        with.evaluate_descriptor(&classical(1, SecurityFlags::NETWORK)),
        Decision::Deny(DenyReason::GateVeto {
            gate: GateKind::SecureEnclave
        })
    );
    assert_eq!(enclave.calls(), 1);
}

#[test]
fn disabled_enclave_switch_masks_the_capability() {
    let enclave = Scripted::new(Verdict::Deny);
    let mut config = CapgateConfig::default();
    config.inventory.enable_enclave = false;
    let engine = Engine::builder(config)
        .capabilities(full())
        .enclave(Box::new(enclave.clone()))
        .build();

    assert!(!engine
        .capability_inventory()
        .contains(Capabilities::SECURE_ENCLAVE));
    assert!(engine
        .evaluate_descriptor(&classical(1, SecurityFlags::NETWORK))
        .is_allowed());
    assert_eq!(enclave.calls(), 0);
}

#[test]
fn first_denial_short_circuits_later_gates() {
    let enclave = Scripted::new(Verdict::Allow);
    let root = Scripted::new(Verdict::Allow);
    let engine = Engine::builder(CapgateConfig::default())
        .capabilities(full())
        .enclave(Box::new(enclave.clone()))
        .root_of_trust(Box::new(root.clone()))
        .build();

    engine.evaluate_descriptor(&classical(1, SecurityFlags::DESTRUCTIVE));
    assert_eq!(enclave.calls(), 0);
    assert_eq!(root.calls(), 0);

    engine.evaluate_descriptor(&classical(2, SecurityFlags::NETWORK));
    assert_eq!(enclave.calls(), 1);
    assert_eq!(root.calls(), 1);
}

#[test]
fn pending_verdict_denies_by_timeout_and_is_not_cached() {
    let root = Scripted::new(Verdict::Pending);
    let engine = Engine::builder(CapgateConfig::default())
        .capabilities(full())
        .root_of_trust(Box::new(root.clone()))
        .build();
    let bytes = classical(9, SecurityFlags::NETWORK);

    let timeout = Decision::Deny(DenyReason::GateTimeout {
        gate: GateKind::HardwareAttestation,
    });
    assert_eq!(engine.evaluate_descriptor(&bytes), timeout);
    assert_eq!(engine.evaluate_descriptor(&bytes), timeout);

    assert!(engine.cache().is_empty());
    assert_eq!(root.calls(), 2);
    let stats = engine.snapshot_statistics();
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.denials_by_gate.get("hardware_attestation"), Some(&2));
}

#[test]
fn malformed_input_is_an_error_not_a_denial() {
    let engine = engine(Capabilities::BASELINE);
    assert_eq!(
        engine.evaluate_descriptor(&[0u8; 5]),
        Decision::Error(DescriptorError::Malformed(MalformedReason::Length {
            len: 5
        }))
    );

    let mut tampered = classical(3, SecurityFlags::NETWORK);
    if let Some(last) = tampered.last_mut() {
        *last ^= 0x01;
    }
    assert!(matches!(
        engine.evaluate_descriptor(&tampered),
        Decision::Error(DescriptorError::IntegrityViolation(_))
    ));

    assert!(engine.cache().is_empty());
    let stats = engine.snapshot_statistics();
    assert_eq!(stats.total_evaluations, 2);
    assert_eq!(stats.security_violations, 2);
    assert!(stats.denials_by_gate.values().all(|n| *n == 0));
}

#[test]
fn standard_pipeline_order() {
    let engine = engine(Capabilities::BASELINE);
    assert_eq!(engine.pipeline().stages(), GateKind::ALL.to_vec());
}

#[test]
fn rejected_signature_is_an_integrity_error() {
    struct RejectAll;

    impl capgate::integrity::SignatureVerifier for RejectAll {
        fn verify(&self, _descriptor: &capgate::descriptor::QuantumDescriptor) -> bool {
            false
        }
    }

    let engine = Engine::builder(CapgateConfig::default())
        .capabilities(Capabilities::BASELINE)
        .signatures(Box::new(RejectAll))
        .build();

    assert!(matches!(
        engine.evaluate_descriptor(&quantum(4, SecurityFlags::NETWORK)),
        Decision::Error(DescriptorError::IntegrityViolation(_))
    ));
    assert!(engine
        .evaluate_descriptor(&classical(4, SecurityFlags::NETWORK))
        .is_allowed());
}
