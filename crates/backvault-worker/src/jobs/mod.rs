//! Built-in job handlers.
//!
//! - `file`: upload source files as-is or as single-file `tar.gz` archives
//! - `directory`: archive a directory tree
//! - `command`: capture a command's stdout
//! - `postgres` / `mysql`: capture a database dump

pub mod archive;
pub mod command;
pub mod database;
pub mod directory;
pub mod file;
pub mod process;

pub use command::CommandJobHandler;
pub use database::{DatabaseJobHandler, DbEngine};
pub use directory::DirectoryJobHandler;
pub use file::FileJobHandler;

use crate::executor::{JobContext, JobExecutionError};

/// Base name for generated archives: `archive_name` when set, else `fallback`.
pub(crate) fn archive_base<'a>(ctx: &JobContext<'a>, fallback: &'a str) -> &'a str {
    ctx.job
        .archive_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(fallback)
}

/// Error for a job descriptor missing a required field.
pub(crate) fn missing_field(job_type: &str, fields: &str) -> JobExecutionError {
    JobExecutionError::Permanent(format!("'{job_type}' job requires {fields}"))
}
