//! Core type definitions used across the Backvault workspace.

pub mod host;
pub mod interval;
pub mod naming;
pub mod task_id;

pub use interval::{IntervalSpec, parse_interval};
pub use task_id::TaskId;
