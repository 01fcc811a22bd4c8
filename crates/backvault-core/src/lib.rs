//! # backvault-core
//!
//! Core crate for Backvault. Contains the configuration schema and loader,
//! the object store trait, shared value types (schedule intervals, task
//! identifiers, artifact naming), and the unified error system.
//!
//! This crate has **no** internal dependencies on other Backvault crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
