//! Lock-free evaluation counters.
//!
//! Every counter is an independent [`AtomicU64`]; increments commute, so
//! concurrent evaluations never lose updates and never contend on a lock.
//! A [`StatsSnapshot`] reads each counter once, so counters in one snapshot
//! may come from slightly different instants.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::decision::GateKind;

/// Shared counters for the descriptor and syscall paths.
#[derive(Debug)]
pub struct Statistics {
    total_evaluations: AtomicU64,
    cache_hits: AtomicU64,
    security_violations: AtomicU64,
    blocked_operations: AtomicU64,
    security_events: AtomicU64,
    fast_path_hits: AtomicU64,
    /// Reserved; no rule increments it yet.
    false_positives: AtomicU64,
    total_time_ns: AtomicU64,
    syscall_checks: AtomicU64,
    gate_denials: [AtomicU64; 4],
}

impl Statistics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self {
            total_evaluations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            security_violations: AtomicU64::new(0),
            blocked_operations: AtomicU64::new(0),
            security_events: AtomicU64::new(0),
            fast_path_hits: AtomicU64::new(0),
            false_positives: AtomicU64::new(0),
            total_time_ns: AtomicU64::new(0),
            syscall_checks: AtomicU64::new(0),
            gate_denials: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Count one descriptor evaluation and its wall time.
    pub fn record_evaluation(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_evaluations.fetch_add(1, Ordering::Relaxed);
        self.total_time_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Count a decision served from the cache.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a descriptor evaluation that did not end in allow.
    pub fn record_violation(&self) {
        self.security_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a veto by `gate`.
    pub fn record_gate_denial(&self, gate: GateKind) {
        if let Some(counter) = self.gate_denials.get(gate.index()) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one syscall check.
    pub fn record_syscall_check(&self) {
        self.syscall_checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a syscall allowed without inspection.
    pub fn record_fast_path(&self) {
        self.fast_path_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a blocked syscall.
    pub fn record_blocked(&self) {
        self.blocked_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a critical or destructive syscall observation.
    pub fn record_security_event(&self) {
        self.security_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters and derive rates.
    pub fn snapshot(&self) -> StatsSnapshot {
        let total_evaluations = self.total_evaluations.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let total_time_ns = self.total_time_ns.load(Ordering::Relaxed);

        let cache_hit_rate = if total_evaluations == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = cache_hits as f64 / total_evaluations as f64;
            rate
        };
        let avg_time_ns = total_time_ns.checked_div(total_evaluations).unwrap_or(0);

        let denials_by_gate = GateKind::ALL
            .iter()
            .map(|gate| {
                let count = self
                    .gate_denials
                    .get(gate.index())
                    .map_or(0, |c| c.load(Ordering::Relaxed));
                (gate.name(), count)
            })
            .collect();

        StatsSnapshot {
            total_evaluations,
            cache_hits,
            security_violations: self.security_violations.load(Ordering::Relaxed),
            blocked_operations: self.blocked_operations.load(Ordering::Relaxed),
            security_events: self.security_events.load(Ordering::Relaxed),
            fast_path_hits: self.fast_path_hits.load(Ordering::Relaxed),
            false_positives: self.false_positives.load(Ordering::Relaxed),
            syscall_checks: self.syscall_checks.load(Ordering::Relaxed),
            total_time_ns,
            avg_time_ns,
            cache_hit_rate,
            denials_by_gate,
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`Statistics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Descriptor evaluations, including cache hits and rejections.
    pub total_evaluations: u64,
    /// Descriptor evaluations answered from the cache.
    pub cache_hits: u64,
    /// Descriptor evaluations that ended in deny or error.
    pub security_violations: u64,
    /// Syscalls denied.
    pub blocked_operations: u64,
    /// Critical or destructive syscalls observed.
    pub security_events: u64,
    /// Syscalls allowed as unknown or safe.
    pub fast_path_hits: u64,
    /// Reserved; always zero today.
    pub false_positives: u64,
    /// Syscall checks performed.
    pub syscall_checks: u64,
    /// Cumulative descriptor evaluation time.
    pub total_time_ns: u64,
    /// `total_time_ns / total_evaluations`, or 0.
    pub avg_time_ns: u64,
    /// `cache_hits / total_evaluations`, or 0.
    pub cache_hit_rate: f64,
    /// Vetoes per pipeline gate.
    pub denials_by_gate: BTreeMap<&'static str, u64>,
}
