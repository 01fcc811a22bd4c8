//! Job executor: dispatches backup jobs to registered handlers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing;

use backvault_core::config::{DefaultsConfig, JobConfig};
use backvault_core::error::AppError;

use crate::jobs::{CommandJobHandler, DatabaseJobHandler, DirectoryJobHandler, FileJobHandler};

/// Everything a handler needs to produce artifacts for one run.
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    /// Job descriptor.
    pub job: &'a JobConfig,
    /// Display name of the job.
    pub job_name: &'a str,
    /// Global defaults.
    pub defaults: &'a DefaultsConfig,
    /// Scoped temporary directory for generated artifacts.
    pub workspace: &'a Path,
    /// Start time of the run (UTC), used for dated archive names.
    pub started_at: DateTime<Utc>,
}

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Produce the local artifacts to upload.
    async fn execute(&self, ctx: JobContext<'_>) -> Result<Vec<PathBuf>, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The job definition cannot succeed as written
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// I/O, subprocess, or object store failure; may succeed next time
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Dispatches jobs to the appropriate handler based on their `type`
#[derive(Debug)]
pub struct JobExecutor {
    /// Registered job handlers by type
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create an executor with no handlers
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Executor with the file, directory, command, postgres and mysql handlers
    pub fn with_builtin_handlers() -> Self {
        let mut executor = Self::new();
        executor.register(Arc::new(FileJobHandler));
        executor.register(Arc::new(DirectoryJobHandler));
        executor.register(Arc::new(CommandJobHandler));
        executor.register(Arc::new(DatabaseJobHandler::postgres()));
        executor.register(Arc::new(DatabaseJobHandler::mysql()));
        executor
    }

    /// Register a job handler
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        tracing::debug!("Registered job handler for type '{}'", job_type);
        self.handlers.insert(job_type, handler);
    }

    /// Execute a job by dispatching to the correct handler
    pub async fn execute(&self, ctx: JobContext<'_>) -> Result<Vec<PathBuf>, JobExecutionError> {
        let job_type = ctx.job.kind();
        let handler = self.handlers.get(&job_type).ok_or_else(|| {
            JobExecutionError::Permanent(format!("Unknown job type: '{job_type}'"))
        })?;

        tracing::info!(
            "Executing job: name='{}', type='{}'",
            ctx.job_name,
            job_type
        );

        handler.execute(ctx).await
    }

    /// Check if a handler is registered for a job type
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get the list of registered job types
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new()
    }
}
