//! Decision cache tests.

use capgate::cache::{DecisionCache, Fingerprint, DEFAULT_CAPACITY};
use capgate::descriptor::SecurityFlags;
use capgate::{Decision, DenyReason, GateKind};
use sha2::{Digest, Sha256};

use crate::support::{classical, engine_with_capacity};

fn fp(n: u8) -> Fingerprint {
    Fingerprint::from_bytes([n; 8])
}

fn veto() -> Decision {
    Decision::Deny(DenyReason::GateVeto {
        gate: GateKind::Policy,
    })
}

#[test]
fn fingerprint_is_sha256_prefix() {
    let bytes = classical(77, SecurityFlags::NETWORK);
    let digest = Sha256::digest(&bytes);
    assert_eq!(&Fingerprint::of(&bytes).as_bytes()[..], &digest[..8]);
    assert_eq!(Fingerprint::of(&bytes).to_string().len(), 16);
}

#[test]
fn store_then_lookup() {
    let cache = DecisionCache::new(4);
    assert!(cache.lookup(&fp(1)).is_none());
    cache.store(fp(1), veto());
    assert_eq!(cache.lookup(&fp(1)), Some(veto()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn oldest_entry_is_evicted_at_capacity() {
    let cache = DecisionCache::new(3);
    for n in 1..=4 {
        cache.store(fp(n), Decision::Allow);
    }
    assert_eq!(cache.len(), 3);
    assert!(cache.lookup(&fp(1)).is_none());
    for n in 2..=4 {
        assert!(cache.lookup(&fp(n)).is_some(), "fingerprint {n}");
    }
}

#[test]
fn eviction_ignores_recent_hits() {
    let cache = DecisionCache::new(2);
    cache.store(fp(1), Decision::Allow);
    cache.store(fp(2), Decision::Allow);
    assert!(cache.lookup(&fp(1)).is_some());
    cache.store(fp(3), Decision::Allow);
    assert!(cache.lookup(&fp(1)).is_none());
    assert!(cache.lookup(&fp(2)).is_some());
}

#[test]
fn restoring_a_key_updates_in_place() {
    let cache = DecisionCache::new(2);
    cache.store(fp(1), Decision::Allow);
    cache.store(fp(2), Decision::Allow);
    cache.store(fp(1), veto());
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.lookup(&fp(1)), Some(veto()));
    assert!(cache.lookup(&fp(2)).is_some());
}

#[test]
fn colliding_fingerprints_share_a_decision() {
    // Keys are truncated digests, so anything mapping to the same eight
    // bytes reads back the first decision stored under them.
    let cache = DecisionCache::new(8);
    let bytes = classical(5, SecurityFlags::DESTRUCTIVE);
    cache.store(Fingerprint::of(&bytes), veto());

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&Sha256::digest(&bytes)[..8]);
    assert_eq!(cache.lookup(&Fingerprint::from_bytes(prefix)), Some(veto()));
}

#[test]
fn zero_capacity_is_clamped_to_one() {
    let cache = DecisionCache::new(0);
    assert_eq!(cache.capacity(), 1);
    cache.store(fp(1), Decision::Allow);
    cache.store(fp(2), Decision::Allow);
    assert_eq!(cache.len(), 1);
    assert!(cache.lookup(&fp(2)).is_some());
}

#[test]
fn default_capacity() {
    assert_eq!(DecisionCache::default().capacity(), DEFAULT_CAPACITY);
    assert_eq!(DEFAULT_CAPACITY, 10_000);
}

#[test]
fn entry_records_insertion_time() {
    let cache = DecisionCache::new(1);
    let before = chrono::Utc::now();
    cache.store(fp(1), Decision::Allow);
    let entry = cache.entry(&fp(1)).expect("cached");
    assert!(entry.inserted_at >= before);
    assert_eq!(entry.decision, Decision::Allow);
}

#[test]
fn repeated_descriptor_is_served_from_cache() {
    let engine = engine_with_capacity(16);
    let bytes = classical(11, SecurityFlags::DESTRUCTIVE);

    let first = engine.evaluate_descriptor(&bytes);
    let second = engine.evaluate_descriptor(&bytes);
    assert_eq!(first, second);

    let stats = engine.snapshot_statistics();
    assert_eq!(stats.total_evaluations, 2);
    assert_eq!(stats.cache_hits, 1);
    // Cached denials still count as violations; the gate counter does not
    // move on a hit.
    assert_eq!(stats.security_violations, 2);
    assert_eq!(stats.denials_by_gate.get("policy"), Some(&1));
}

#[test]
fn engine_cache_evicts_first_in() {
    let engine = engine_with_capacity(2);
    let a = classical(1, SecurityFlags::NETWORK);
    let b = classical(2, SecurityFlags::NETWORK);
    let c = classical(3, SecurityFlags::NETWORK);

    engine.evaluate_descriptor(&a);
    engine.evaluate_descriptor(&b);
    engine.evaluate_descriptor(&c);
    engine.evaluate_descriptor(&a);

    assert_eq!(engine.snapshot_statistics().cache_hits, 0);
    assert_eq!(engine.cache().len(), 2);
}
