//! The evaluation engine.
//!
//! An [`Engine`] owns everything an evaluation touches: the capability
//! inventory (fixed at build time), the gate pipeline, the decision cache,
//! the syscall registry, and the counters. It is `Send + Sync`; share it
//! behind an `Arc` and call it from any number of threads.

use std::time::Instant;

use tracing::{debug, info};

use crate::cache::{DecisionCache, Fingerprint};
use crate::config::CapgateConfig;
use crate::decision::{Decision, DenyReason};
use crate::descriptor::Descriptor;
use crate::gates::{AlwaysAllow, EnclaveAttestor, Pipeline, RootOfTrust};
use crate::integrity::{Integrity, SignatureVerifier, UnverifiedSignatures};
use crate::inventory::Capabilities;
use crate::stats::{Statistics, StatsSnapshot};
use crate::syscall::{CallerContext, SecurityLevel, SyscallRegistry};

/// Descriptor and syscall evaluator.
#[derive(Debug)]
pub struct Engine {
    capabilities: Capabilities,
    security_level: SecurityLevel,
    integrity: Integrity,
    pipeline: Pipeline,
    cache: DecisionCache,
    registry: SyscallRegistry,
    stats: Statistics,
}

impl Engine {
    /// Start building an engine from `config`.
    pub fn builder(config: CapgateConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Evaluate raw descriptor bytes.
    ///
    /// Decode, integrity check, then cache lookup; on a miss the gate
    /// pipeline runs and its decision is cached. Malformed or tampered
    /// input yields [`Decision::Error`] and never reaches the cache.
    pub fn evaluate_descriptor(&self, bytes: &[u8]) -> Decision {
        let start = Instant::now();
        let decision = self.decide_descriptor(bytes);

        if !decision.is_allowed() {
            self.stats.record_violation();
        }
        self.stats.record_evaluation(start.elapsed());
        decision
    }

    fn decide_descriptor(&self, bytes: &[u8]) -> Decision {
        let descriptor = match Descriptor::decode(bytes) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, len = bytes.len(), "descriptor rejected");
                return Decision::Error(e);
            }
        };

        if let Err(e) = self.integrity.verify(&descriptor) {
            debug!(error = %e, kind = %descriptor.kind(), "integrity check failed");
            return Decision::Error(e);
        }

        let fingerprint = Fingerprint::of(bytes);
        if let Some(cached) = self.cache.lookup(&fingerprint) {
            self.stats.record_cache_hit();
            debug!(%fingerprint, decision = %cached, "cache hit");
            return cached;
        }

        let decision = self.pipeline.run(&descriptor);
        if let Decision::Deny(reason) = decision {
            if let Some(gate) = reason.gate() {
                self.stats.record_gate_denial(gate);
            }
        }

        // Timeout denials are transient.
        if !matches!(decision, Decision::Deny(DenyReason::GateTimeout { .. })) {
            self.cache.store(fingerprint, decision);
        }
        decision
    }

    /// Evaluate a syscall by number for `caller` at `level`.
    pub fn evaluate_syscall(
        &self,
        op_id: i32,
        caller: CallerContext,
        level: SecurityLevel,
    ) -> Decision {
        self.registry.evaluate(&self.stats, op_id, caller, level)
    }

    /// Level configured for this engine. Hosts pass it to
    /// [`Engine::evaluate_syscall`] unless they have a per-call override.
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Current counters.
    pub fn snapshot_statistics(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Capabilities fixed at build time.
    pub fn capability_inventory(&self) -> Capabilities {
        self.capabilities
    }

    /// The decision cache.
    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// The syscall registry.
    pub fn registry(&self) -> &SyscallRegistry {
        &self.registry
    }

    /// The gate pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Consume the engine and return its final counters.
    pub fn shutdown(self) -> StatsSnapshot {
        let stats = self.stats.snapshot();
        info!(
            total_evaluations = stats.total_evaluations,
            cache_hits = stats.cache_hits,
            security_violations = stats.security_violations,
            syscall_checks = stats.syscall_checks,
            blocked_operations = stats.blocked_operations,
            security_events = stats.security_events,
            avg_time_ns = stats.avg_time_ns,
            "engine shut down"
        );
        stats
    }
}

/// Builder for [`Engine`]. Collaborators default to accept-everything
/// placeholders; capabilities default to what the config resolves.
pub struct EngineBuilder {
    config: CapgateConfig,
    capabilities: Option<Capabilities>,
    registry: Option<SyscallRegistry>,
    enclave: Box<dyn EnclaveAttestor>,
    root_of_trust: Box<dyn RootOfTrust>,
    signatures: Box<dyn SignatureVerifier>,
}

impl EngineBuilder {
    fn new(config: CapgateConfig) -> Self {
        Self {
            config,
            capabilities: None,
            registry: None,
            enclave: Box::new(AlwaysAllow),
            root_of_trust: Box::new(AlwaysAllow),
            signatures: Box::new(UnverifiedSignatures),
        }
    }

    /// Use an explicit inventory instead of the configured one. The
    /// config's enclave and attestation switches still apply.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Use a custom syscall table.
    #[must_use]
    pub fn registry(mut self, registry: SyscallRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Secure enclave collaborator.
    #[must_use]
    pub fn enclave(mut self, enclave: Box<dyn EnclaveAttestor>) -> Self {
        self.enclave = enclave;
        self
    }

    /// Hardware root-of-trust collaborator.
    #[must_use]
    pub fn root_of_trust(mut self, root: Box<dyn RootOfTrust>) -> Self {
        self.root_of_trust = root;
        self
    }

    /// Quantum signature verifier.
    #[must_use]
    pub fn signatures(mut self, signatures: Box<dyn SignatureVerifier>) -> Self {
        self.signatures = signatures;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine {
        let capabilities = match self.capabilities {
            Some(explicit) => self.config.inventory.mask(explicit),
            None => self.config.resolve_capabilities(),
        };
        let pipeline = Pipeline::standard(
            capabilities,
            self.config.policy.deny_flags,
            self.enclave,
            self.root_of_trust,
        );
        let engine = Engine {
            capabilities,
            security_level: self.config.engine.security_level,
            integrity: Integrity::new(self.config.integrity.checksum, self.signatures),
            pipeline,
            cache: DecisionCache::new(self.config.engine.cache_capacity),
            registry: self.registry.unwrap_or_default(),
            stats: Statistics::new(),
        };
        info!(
            capabilities = ?engine.capabilities,
            security_level = %engine.security_level,
            cache_capacity = engine.cache.capacity(),
            checksum = ?engine.integrity.algorithm(),
            syscalls = engine.registry.len(),
            "engine initialized"
        );
        engine
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
