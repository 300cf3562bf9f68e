//! capgate CLI entry point.
//!
//! One-shot subcommands for evaluating and building descriptors, checking
//! syscalls, and inspecting the host inventory, plus a concurrent `stress`
//! run against a shared engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use capgate::config::{config_dir, CapgateConfig};
use capgate::descriptor::{
    ClassicalDescriptor, Performance, QuantumDescriptor, SecurityFlags, SIGNATURE_LEN,
};
use capgate::inventory::Capabilities;
use capgate::syscall::{CallerContext, SecurityLevel, SyscallRegistry};
use capgate::{Decision, Engine};

/// capgate — capability-gated descriptor and syscall evaluation.
#[derive(Parser)]
#[command(name = "capgate", version, about)]
struct Cli {
    /// Config file (default: `$CAPGATE_CONFIG_PATH` or `~/.capgate/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Evaluate hex-encoded descriptors and print decisions and statistics.
    Evaluate {
        /// Descriptors as hex strings.
        #[arg(required = true)]
        descriptors: Vec<String>,
    },
    /// Build a descriptor and print it as hex.
    Encode {
        /// Descriptor layout.
        #[arg(value_enum)]
        kind: Layout,
        /// Command hash (decimal or `0x` hex).
        #[arg(long, value_parser = parse_u32)]
        hash: u32,
        /// Comma-separated flag names, e.g. `network,critical`.
        #[arg(long, value_delimiter = ',')]
        flags: Vec<String>,
        /// Typical execution time in milliseconds.
        #[arg(long, default_value_t = 0)]
        exec_ms: u16,
        /// Typical memory use in megabytes.
        #[arg(long, default_value_t = 0)]
        memory_mb: u16,
        /// Typical output size in kilobytes.
        #[arg(long, default_value_t = 0)]
        output_kb: u16,
        /// Quantum signature snippet as hex (11 bytes, default zeros).
        #[arg(long)]
        signature: Option<String>,
    },
    /// Evaluate one syscall for a caller.
    Syscall {
        /// Syscall number.
        #[arg(long)]
        op: i32,
        /// Caller runs as root.
        #[arg(long)]
        privileged: bool,
        /// Caller is in a container.
        #[arg(long)]
        isolated: bool,
        /// Security level (default: configured level).
        #[arg(long)]
        level: Option<u8>,
    },
    /// Print the capability inventory the engine would use.
    Inventory,
    /// Print the syscall registry.
    Table,
    /// Hammer a shared engine from concurrent workers.
    Stress {
        /// Concurrent workers.
        #[arg(long, default_value_t = 8)]
        workers: usize,
        /// Evaluations per worker.
        #[arg(long, default_value_t = 10_000)]
        iterations: usize,
        /// Also write JSON logs under `~/.capgate/logs`.
        #[arg(long)]
        log_to_file: bool,
    },
}

/// Descriptor layout selector.
#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    /// 24-byte checksummed layout.
    Classical,
    /// 32-byte signed layout.
    Quantum,
}

#[derive(Serialize)]
struct EvaluationReport {
    input: String,
    allowed: bool,
    decision: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _logging_guard = match &cli.command {
        Command::Stress {
            log_to_file: true, ..
        } => Some(capgate::logging::init_production(&config_dir()?.join("logs"))?),
        _ => {
            capgate::logging::init_cli();
            None
        }
    };

    let config = match &cli.config {
        Some(path) => CapgateConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CapgateConfig::load().context("failed to load configuration")?,
    };

    match cli.command {
        Command::Evaluate { descriptors } => handle_evaluate(config, &descriptors),
        Command::Encode {
            kind,
            hash,
            flags,
            exec_ms,
            memory_mb,
            output_kb,
            signature,
        } => {
            let performance = Performance {
                exec_time_ms: exec_ms,
                memory_mb,
                output_kb,
            };
            handle_encode(&config, kind, hash, &flags, performance, signature.as_deref())
        }
        Command::Syscall {
            op,
            privileged,
            isolated,
            level,
        } => handle_syscall(config, op, CallerContext { privileged, isolated }, level),
        Command::Inventory => print_json(&config.resolve_capabilities()),
        Command::Table => print_json(SyscallRegistry::builtin().records()),
        Command::Stress {
            workers,
            iterations,
            ..
        } => handle_stress(config, workers, iterations).await,
    }
}

fn handle_evaluate(config: CapgateConfig, descriptors: &[String]) -> anyhow::Result<()> {
    let engine = Engine::builder(config).build();
    let mut reports = Vec::with_capacity(descriptors.len());
    for input in descriptors {
        let bytes = hex::decode(input.trim())
            .with_context(|| format!("descriptor is not valid hex: {input}"))?;
        let decision = engine.evaluate_descriptor(&bytes);
        reports.push(report(input, decision));
    }
    let stats = engine.shutdown();
    print_json(&serde_json::json!({
        "decisions": reports,
        "statistics": stats,
    }))
}

fn handle_encode(
    config: &CapgateConfig,
    kind: Layout,
    hash: u32,
    flag_names: &[String],
    performance: Performance,
    signature: Option<&str>,
) -> anyhow::Result<()> {
    let flags = flag_names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .try_fold(SecurityFlags::NONE, |acc, name| {
            SecurityFlags::from_name(name)
                .map(|flag| acc.union(flag))
                .ok_or_else(|| anyhow::anyhow!("unknown security flag: {name}"))
        })?;

    let bytes = match kind {
        Layout::Classical => ClassicalDescriptor::new(hash, flags, performance)
            .sealed(config.integrity.checksum)
            .to_bytes()
            .to_vec(),
        Layout::Quantum => {
            let mut sig = [0u8; SIGNATURE_LEN];
            if let Some(hex_sig) = signature {
                let raw = hex::decode(hex_sig.trim()).context("signature is not valid hex")?;
                anyhow::ensure!(
                    raw.len() == SIGNATURE_LEN,
                    "signature must be {SIGNATURE_LEN} bytes, got {}",
                    raw.len()
                );
                sig.copy_from_slice(&raw);
            }
            QuantumDescriptor::new(hash, flags, performance, sig)
                .to_bytes()
                .to_vec()
        }
    };
    println!("{}", hex::encode(bytes));
    Ok(())
}

fn handle_syscall(
    config: CapgateConfig,
    op: i32,
    caller: CallerContext,
    level: Option<u8>,
) -> anyhow::Result<()> {
    let engine = Engine::builder(config).build();
    let level = match level {
        Some(raw) => SecurityLevel::new(raw)?,
        None => engine.security_level(),
    };
    let decision = engine.evaluate_syscall(op, caller, level);
    let stats = engine.shutdown();
    print_json(&serde_json::json!({
        "op": op,
        "level": level,
        "allowed": decision.is_allowed(),
        "decision": decision.to_string(),
        "statistics": stats,
    }))
}

async fn handle_stress(
    config: CapgateConfig,
    workers: usize,
    iterations: usize,
) -> anyhow::Result<()> {
    let algorithm = config.integrity.checksum;
    let engine = Arc::new(
        Engine::builder(config)
            .capabilities(Capabilities::BASELINE)
            .build(),
    );
    let level = engine.security_level();

    // A small working set so the cache sees both misses and hits.
    let samples: Arc<Vec<Vec<u8>>> = Arc::new(
        (0u32..64)
            .map(|hash| {
                let flags = if hash.checked_rem(4) == Some(0) {
                    SecurityFlags::DESTRUCTIVE
                } else {
                    SecurityFlags::NETWORK
                };
                ClassicalDescriptor::new(hash, flags, Performance::default())
                    .sealed(algorithm)
                    .to_bytes()
                    .to_vec()
            })
            .collect(),
    );

    info!(workers, iterations, "stress run starting");
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let engine = Arc::clone(&engine);
        let samples = Arc::clone(&samples);
        handles.push(tokio::task::spawn_blocking(move || {
            for i in 0..iterations {
                let idx = i.wrapping_add(worker).checked_rem(samples.len()).unwrap_or(0);
                if let Some(bytes) = samples.get(idx) {
                    engine.evaluate_descriptor(bytes);
                }
                let op = if i.checked_rem(2) == Some(0) {
                    capgate::syscall::nr::EXECVE
                } else {
                    capgate::syscall::nr::GETPID
                };
                engine.evaluate_syscall(op, CallerContext::USER, level);
            }
        }));
    }
    for handle in handles {
        handle.await.context("stress worker panicked")?;
    }

    let engine = Arc::try_unwrap(engine)
        .map_err(|_| anyhow::anyhow!("engine still shared after workers finished"))?;
    print_json(&engine.shutdown())
}

fn report(input: &str, decision: Decision) -> EvaluationReport {
    EvaluationReport {
        input: input.to_owned(),
        allowed: decision.is_allowed(),
        decision: decision.to_string(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn parse_u32(raw: &str) -> Result<u32, String> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid u32 '{raw}': {e}"))
}
