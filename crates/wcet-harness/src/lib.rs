//! Driver layer for allocator WCET measurement.
//!
//! This crate provides:
//! - Run configuration: CLI values with environment fallbacks
//! - Scenario runner: runs scenarios, prints result records, flushes the
//!   cache between scenarios
//! - Interactive menu over the same runner
//! - Structured JSONL logging of every run

#![forbid(unsafe_code)]

pub mod config;
pub mod menu;
pub mod runner;
pub mod structured_log;

pub use config::{AllocatorKind, ClockKind, RunConfig, ScenarioSelection};
pub use runner::{RunError, ScenarioRunner};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// Process exit code when the measured allocation itself fails.
pub const FATAL_EXIT_CODE: i32 = 3;
