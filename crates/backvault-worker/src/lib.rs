//! Backup coordination and execution for Backvault.
//!
//! This crate provides:
//! - A per-job file lock and a shared task registry
//! - A coordinator combining both into a claim/release protocol
//! - An interval scheduler, a one-shot runner, and shutdown signal handling
//! - A job executor with built-in handlers (files, directories, commands, databases)
//! - The backup pipeline and the retention engine

pub mod coordinator;
pub mod executor;
pub mod jobs;
pub mod lock;
pub mod pipeline;
pub mod registry;
pub mod retention;
pub mod runner;
pub mod scheduler;
pub mod signal;

pub use coordinator::{Claim, ClaimOutcome, Coordinator};
pub use executor::{JobExecutionError, JobExecutor};
pub use pipeline::{BackupPipeline, JobBody};
pub use retention::RetentionEngine;
pub use runner::{OneShotRunner, RetentionRunner, RunSummary};
pub use scheduler::IntervalScheduler;
