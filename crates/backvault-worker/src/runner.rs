//! One-shot runner: runs selected jobs once, in order.

use std::sync::Arc;

use serde::Serialize;
use tracing;

use backvault_core::config::{AppConfig, DefaultsConfig, JobConfig};
use backvault_core::error::AppError;
use backvault_core::result::AppResult;
use backvault_core::types::naming::job_prefix;

use crate::coordinator::{ClaimOutcome, Coordinator};
use crate::pipeline::{JobBody, execute_claim};
use crate::retention::RetentionEngine;

/// Per-run outcome counts, by job name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Jobs that completed.
    pub ran: Vec<String>,
    /// Jobs skipped because another run held them.
    pub skipped: Vec<String>,
    /// Jobs that failed.
    pub failed: Vec<String>,
}

impl RunSummary {
    /// Whether any job failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Select jobs by display name, in the order given.
///
/// `None` selects every job. Any unknown name is an error naming all of
/// the missing ones, and nothing is selected.
pub fn select_jobs<'a>(
    jobs: &'a [JobConfig],
    names: Option<&[String]>,
) -> AppResult<Vec<&'a JobConfig>> {
    let Some(names) = names else {
        return Ok(jobs.iter().collect());
    };

    let mut selected = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match jobs.iter().find(|j| j.display_name() == Some(name.as_str())) {
            Some(job) => selected.push(job),
            None => missing.push(name.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(AppError::not_found(format!(
            "Jobs not found: {}",
            missing.join(", ")
        )));
    }
    Ok(selected)
}

/// Runs jobs once through the coordinator.
#[derive(Debug, Clone)]
pub struct OneShotRunner {
    coordinator: Arc<Coordinator>,
    body: Arc<dyn JobBody>,
}

impl OneShotRunner {
    /// Create a runner.
    pub fn new(coordinator: Arc<Coordinator>, body: Arc<dyn JobBody>) -> Self {
        Self { coordinator, body }
    }

    /// Run `jobs` in order. A failed or skipped job does not stop the rest.
    pub async fn run(&self, jobs: &[&JobConfig]) -> RunSummary {
        let mut summary = RunSummary::default();

        for job in jobs {
            let Some(name) = job.display_name() else {
                tracing::error!("Job failed: job requires a 'name'");
                summary.failed.push(String::new());
                continue;
            };
            tracing::info!("==> Running job: {}", name);

            match self.coordinator.try_claim(name).await {
                ClaimOutcome::Registered => {
                    tracing::info!(
                        "Another run is registered for job '{}'. Skipping.",
                        name
                    );
                    summary.skipped.push(name.to_string());
                }
                ClaimOutcome::Locked => {
                    tracing::info!("Another run is in progress for job '{}'. Skipping.", name);
                    summary.skipped.push(name.to_string());
                }
                ClaimOutcome::Claimed(claim) => {
                    let result =
                        execute_claim(&self.coordinator, self.body.clone(), (*job).clone(), claim)
                            .await;
                    match result {
                        Ok(()) => summary.ran.push(name.to_string()),
                        Err(_) => summary.failed.push(name.to_string()),
                    }
                }
            }
        }

        summary
    }
}

/// Applies retention only, without producing backups.
///
/// Jobs with a registered run are skipped. No lock is taken.
#[derive(Debug, Clone)]
pub struct RetentionRunner {
    coordinator: Arc<Coordinator>,
    engine: RetentionEngine,
    defaults: DefaultsConfig,
    default_bucket: Option<String>,
    dry_run: bool,
}

impl RetentionRunner {
    /// Create a retention runner for `config`.
    pub fn new(coordinator: Arc<Coordinator>, engine: RetentionEngine, config: &AppConfig) -> Self {
        Self {
            coordinator,
            engine,
            defaults: config.defaults.clone(),
            default_bucket: config.object_store.default_bucket().map(str::to_string),
            dry_run: false,
        }
    }

    /// Log deletions instead of performing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sweep each job's prefix in order.
    pub async fn run(&self, jobs: &[&JobConfig]) -> RunSummary {
        let mut summary = RunSummary::default();

        for job in jobs {
            let Some(name) = job.display_name() else {
                summary.failed.push(String::new());
                continue;
            };
            tracing::info!("==> Retention for job: {}", name);

            if self.coordinator.is_registered(name).await {
                tracing::info!(
                    "Another run is registered for job '{}'. Skipping.",
                    name
                );
                summary.skipped.push(name.to_string());
                continue;
            }

            let Some(bucket) = job.target_bucket(self.default_bucket.as_deref()) else {
                tracing::info!("Skipping retention: no bucket defined for job.");
                summary.skipped.push(name.to_string());
                continue;
            };

            let prefix = job_prefix(&job.effective_prefix(&self.defaults), name);
            match self
                .engine
                .apply(bucket, &prefix, job.effective_retention(&self.defaults), self.dry_run)
                .await
            {
                Ok(_) => summary.ran.push(name.to_string()),
                Err(e) => {
                    tracing::error!("Retention failed for job '{}': {}", name, e);
                    summary.failed.push(name.to_string());
                }
            }
        }

        summary
    }
}
