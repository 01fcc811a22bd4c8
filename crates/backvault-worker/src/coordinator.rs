//! Claim/release protocol shared by the scheduler and the one-shot runner.
//!
//! A claim checks the task registry first (cheap, visible across hosts that
//! share the registry file), then takes the job lock (the exclusion
//! primitive on this host), then registers a fresh task id.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use backvault_core::config::CoordinationConfig;
use backvault_core::types::TaskId;

use crate::lock::{FileJobLock, JobLock};
use crate::registry::TaskRegistry;

/// A successful claim on a job. Must be handed back to [`Coordinator::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Job display name.
    pub job_name: String,
    /// Task id written into the registry.
    pub task_id: TaskId,
}

/// Result of [`Coordinator::try_claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The job was claimed by this process.
    Claimed(Claim),
    /// A fresh registry record exists for the job.
    Registered,
    /// The job lock is held.
    Locked,
}

/// Combines the job lock and the task registry.
#[derive(Debug, Clone)]
pub struct Coordinator {
    lock: Arc<dyn JobLock>,
    registry: TaskRegistry,
    ttl: Duration,
}

impl Coordinator {
    /// Create a coordinator from explicit parts.
    pub fn new(lock: Arc<dyn JobLock>, registry: TaskRegistry, ttl: Duration) -> Self {
        Self {
            lock,
            registry,
            ttl,
        }
    }

    /// File locks in `lock_dir` plus the registry at `tasks_file`.
    pub fn from_config(config: &CoordinationConfig) -> Self {
        Self::new(
            Arc::new(FileJobLock::from_config(config)),
            TaskRegistry::from_config(config),
            config.lock_ttl(),
        )
    }

    /// Task registry used by this coordinator.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Lock and registry TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether a fresh registry record exists for `job_name`.
    pub async fn is_registered(&self, job_name: &str) -> bool {
        self.registry.active_jobs(self.ttl).await.contains(job_name)
    }

    /// Try to claim `job_name` for one run.
    pub async fn try_claim(&self, job_name: &str) -> ClaimOutcome {
        if self.is_registered(job_name).await {
            return ClaimOutcome::Registered;
        }
        if !self.lock.acquire(job_name, self.ttl).await {
            return ClaimOutcome::Locked;
        }

        let task_id = TaskId::generate(job_name);
        info!("task_id={task_id}");
        self.registry.add(job_name, &task_id).await;
        ClaimOutcome::Claimed(Claim {
            job_name: job_name.to_string(),
            task_id,
        })
    }

    /// Remove the registry record, then drop the lock.
    pub async fn release(&self, claim: Claim) {
        self.registry.remove(&claim.task_id).await;
        self.lock.release(&claim.job_name).await;
    }
}
