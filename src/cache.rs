//! Fixed-capacity decision cache keyed by descriptor fingerprint.
//!
//! Entries live in a ring: each store claims the slot at the head and evicts
//! whatever key was there, regardless of how recently it was hit. Lookups go
//! through a hash map, so both operations are O(1).

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::decision::Decision;

/// Default number of cached decisions.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Width of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 8;

/// SHA-256 of the raw descriptor bytes, truncated to 8 bytes.
///
/// Truncation makes collisions possible; two colliding descriptors share a
/// cached decision.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint raw descriptor bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; FINGERPRINT_LEN];
        if let Some(prefix) = digest.get(..FINGERPRINT_LEN) {
            out.copy_from_slice(prefix);
        }
        Self(out)
    }

    /// Wrap precomputed fingerprint bytes.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(self.0))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A cached decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Decision computed on the original miss.
    pub decision: Decision,
    /// When the entry was stored.
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<Fingerprint, CacheEntry>,
    ring: Vec<Option<Fingerprint>>,
    head: usize,
}

/// Bounded fingerprint → decision cache with FIFO eviction.
///
/// Uses a sync [`Mutex`] since the critical section is short and never
/// awaits. A poisoned lock turns lookups into misses and drops stores.
#[derive(Debug)]
pub struct DecisionCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl DecisionCache {
    /// Create a cache holding at most `capacity` decisions (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                ring: vec![None; capacity],
                head: 0,
            }),
            capacity,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached decision for `fingerprint`, if it has not been evicted.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Decision> {
        self.entry(fingerprint).map(|e| e.decision)
    }

    /// Full cache entry for `fingerprint`.
    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        match self.state.lock() {
            Ok(state) => state.entries.get(fingerprint).copied(),
            Err(e) => {
                warn!(error = %e, "decision cache lock poisoned, treating as miss");
                None
            }
        }
    }

    /// Store a decision, evicting the oldest slot when full.
    ///
    /// Storing a fingerprint that is already cached updates it in place
    /// without claiming a new slot.
    pub fn store(&self, fingerprint: Fingerprint, decision: Decision) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "decision cache lock poisoned, dropping store");
                return;
            }
        };

        let entry = CacheEntry {
            decision,
            inserted_at: Utc::now(),
        };

        if let Some(existing) = state.entries.get_mut(&fingerprint) {
            *existing = entry;
            return;
        }

        let head = state.head;
        let evicted = state.ring.get_mut(head).and_then(|slot| slot.replace(fingerprint));
        if let Some(old) = evicted {
            state.entries.remove(&old);
        }
        state.entries.insert(fingerprint, entry);
        state.head = head
            .checked_add(1)
            .and_then(|next| next.checked_rem(self.capacity))
            .unwrap_or(0);
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
