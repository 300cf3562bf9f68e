//! capgate — capability-gated evaluation of command descriptors and syscalls.
//!
//! Compact binary descriptors (24-byte classical, 32-byte quantum) are
//! decoded, integrity-checked, looked up in a fingerprint cache, and run
//! through a short-circuiting gate pipeline whose optional stages depend on
//! the host's capability inventory. A separate evaluator maps syscall
//! numbers plus caller context to allow/deny.
//!
//! See `DESIGN.md` for the layout decisions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod decision;
pub mod descriptor;
pub mod engine;
pub mod gates;
pub mod integrity;
pub mod inventory;
pub mod logging;
pub mod stats;
pub mod syscall;

pub use decision::{Decision, DenyReason, GateKind};
pub use engine::{Engine, EngineBuilder};
