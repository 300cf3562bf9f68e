//! Configuration loading.
//!
//! Loads `~/.capgate/config.toml` (or `$CAPGATE_CONFIG_PATH`). A missing
//! file yields defaults. Environment variables override file values; file
//! values override defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cache::DEFAULT_CAPACITY;
use crate::descriptor::SecurityFlags;
use crate::integrity::ChecksumAlgorithm;
use crate::inventory::Capabilities;
use crate::syscall::{SecurityLevel, MAX_SECURITY_LEVEL};

/// Env var naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "CAPGATE_CONFIG_PATH";
/// Env var overriding `engine.security_level`.
pub const SECURITY_LEVEL_VAR: &str = "CAPGATE_SECURITY_LEVEL";
/// Env var overriding `engine.cache_capacity`.
pub const CACHE_CAPACITY_VAR: &str = "CAPGATE_CACHE_CAPACITY";

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CapgateConfig {
    /// Engine tuning.
    pub engine: EngineConfig,
    /// Pipeline policy.
    pub policy: PolicyConfig,
    /// Descriptor integrity.
    pub integrity: IntegrityConfig,
    /// Hardware capability inventory.
    pub inventory: InventoryConfig,
}

impl CapgateConfig {
    /// Load with precedence env > file > defaults, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the merged config is invalid.
    pub fn load() -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = config_path_with(env)?;
        let mut config = Self::load_or_default(&path)?;
        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit file, apply env overrides, and validate.
    ///
    /// Unlike [`CapgateConfig::load`], a missing file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse a TOML string. No env overrides, no validation.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or unknown flag/capability names.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment overrides through `env`.
    ///
    /// Invalid values are logged and ignored.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env(SECURITY_LEVEL_VAR) {
            match v.trim().parse::<u8>().ok().and_then(|n| SecurityLevel::new(n).ok()) {
                Some(level) => self.engine.security_level = level,
                None => tracing::warn!(
                    var = SECURITY_LEVEL_VAR,
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env(CACHE_CAPACITY_VAR) {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.engine.cache_capacity = n,
                _ => tracing::warn!(
                    var = CACHE_CAPACITY_VAR,
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.engine.security_level.get() <= MAX_SECURITY_LEVEL,
            "engine.security_level must be at most {MAX_SECURITY_LEVEL}"
        );
        anyhow::ensure!(
            self.engine.cache_capacity >= 1,
            "engine.cache_capacity must be at least 1"
        );
        Ok(())
    }

    /// Capability inventory this config describes.
    ///
    /// Probes the host when `inventory.detect` is set, otherwise uses the
    /// explicit list. The enclave and attestation switches then mask their
    /// bits out.
    pub fn resolve_capabilities(&self) -> Capabilities {
        let base = if self.inventory.detect {
            Capabilities::detect()
        } else {
            self.inventory.capabilities
        };
        self.inventory.mask(base)
    }
}

// ── Sections ────────────────────────────────────────────────────

/// `[engine]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default level for syscall evaluation (0..=6).
    pub security_level: SecurityLevel,
    /// Maximum cached decisions.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::default(),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// `[policy]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Flags the policy gate vetoes.
    pub deny_flags: SecurityFlags,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            deny_flags: SecurityFlags::DESTRUCTIVE,
        }
    }
}

/// `[integrity]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Classical checksum algorithm.
    pub checksum: ChecksumAlgorithm,
}

/// `[inventory]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Probe the host for capabilities.
    pub detect: bool,
    /// Capabilities to use when `detect` is off.
    pub capabilities: Capabilities,
    /// Keep the secure enclave gate.
    pub enable_enclave: bool,
    /// Keep the hardware attestation gate.
    pub enable_attestation: bool,
}

impl InventoryConfig {
    /// Drop the bits switched off in this section.
    pub fn mask(&self, capabilities: Capabilities) -> Capabilities {
        let mut out = capabilities;
        if !self.enable_enclave {
            out = out.without(Capabilities::SECURE_ENCLAVE);
        }
        if !self.enable_attestation {
            out = out.without(Capabilities::ATTESTATION_ROOT);
        }
        out
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            detect: true,
            capabilities: Capabilities::NONE,
            enable_enclave: true,
            enable_attestation: true,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────

/// Base directory: `~/.capgate/`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".capgate"))
}

/// Resolve the config path using a custom env resolver.
///
/// `$CAPGATE_CONFIG_PATH` wins, then `~/.capgate/config.toml`.
///
/// # Errors
///
/// Returns an error if no override is set and the home directory cannot be
/// determined.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(p) = env(CONFIG_PATH_VAR) {
        return Ok(PathBuf::from(p));
    }
    Ok(config_dir()?.join("config.toml"))
}
