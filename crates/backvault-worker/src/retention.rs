//! Retention sweep over a job's remote prefix.
//!
//! The deletion set is computed from one complete listing: objects past the
//! keep-count (newest first) unioned with objects older than the age
//! cutoff. With both rules set the age rule can remove objects the
//! keep-count would have kept.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{error, info};

use backvault_core::config::RetentionPolicy;
use backvault_core::result::AppResult;
use backvault_core::traits::{MAX_DELETE_BATCH, ObjectStore, ObjectSummary};

/// Prefix with exactly one trailing slash.
pub fn normalize_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

/// Keys to delete under `policy` at time `now`, sorted ascending.
///
/// Objects without a last-modified timestamp are never selected.
pub fn plan_deletions(
    objects: &[ObjectSummary],
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<String> {
    if policy.is_noop() {
        return Vec::new();
    }

    let mut dated: Vec<(&str, DateTime<Utc>)> = objects
        .iter()
        .filter_map(|o| o.last_modified.map(|ts| (o.key.as_str(), ts)))
        .collect();
    // Newest first; equal timestamps order by key descending.
    dated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(a.0)));

    let mut doomed = BTreeSet::new();
    if let Some(keep) = policy.keep() {
        doomed.extend(dated.iter().skip(keep).map(|(key, _)| *key));
    }
    // A cutoff before the representable range means nothing is old enough.
    if let Some(cutoff) = policy
        .age_days()
        .and_then(|days| ChronoDuration::try_days(i64::from(days)))
        .and_then(|age| now.checked_sub_signed(age))
    {
        doomed.extend(
            dated
                .iter()
                .filter(|(_, ts)| *ts < cutoff)
                .map(|(key, _)| *key),
        );
    }

    doomed.into_iter().map(str::to_string).collect()
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetentionReport {
    /// Normalized prefix that was swept.
    pub prefix: String,
    /// Objects found under the prefix.
    pub listed: usize,
    /// Keys selected for deletion.
    pub candidates: Vec<String>,
    /// Keys in batches the store accepted.
    pub deleted: usize,
    /// Batches that failed.
    pub failed_batches: usize,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Applies retention policies through an [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct RetentionEngine {
    store: Arc<dyn ObjectStore>,
}

impl RetentionEngine {
    /// Create an engine over `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Sweep `prefix` in `bucket` against the current clock.
    pub async fn apply(
        &self,
        bucket: &str,
        prefix: &str,
        policy: RetentionPolicy,
        dry_run: bool,
    ) -> AppResult<RetentionReport> {
        self.apply_at(bucket, prefix, policy, dry_run, Utc::now())
            .await
    }

    /// Sweep `prefix` in `bucket` as of `now`.
    ///
    /// A listing error aborts the sweep. A failed delete batch is logged
    /// and the remaining batches still run.
    pub async fn apply_at(
        &self,
        bucket: &str,
        prefix: &str,
        policy: RetentionPolicy,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> AppResult<RetentionReport> {
        let prefix = normalize_prefix(prefix);
        let mut report = RetentionReport {
            prefix: prefix.clone(),
            dry_run,
            ..RetentionReport::default()
        };
        if policy.is_noop() {
            return Ok(report);
        }

        let objects = self.store.list_objects(bucket, &prefix).await?;
        report.listed = objects.len();
        if objects.is_empty() {
            return Ok(report);
        }

        report.candidates = plan_deletions(&objects, policy, now);
        if report.candidates.is_empty() {
            return Ok(report);
        }

        info!(
            "Retention: will delete {} object(s) under prefix '{}'",
            report.candidates.len(),
            prefix
        );

        if dry_run {
            for key in &report.candidates {
                info!("[dry-run] delete s3://{bucket}/{key}");
            }
            return Ok(report);
        }

        for batch in report.candidates.chunks(MAX_DELETE_BATCH) {
            match self.store.delete_objects(bucket, batch).await {
                Ok(()) => report.deleted += batch.len(),
                Err(e) => {
                    report.failed_batches += 1;
                    error!(
                        bucket,
                        batch_size = batch.len(),
                        "Retention delete batch failed: {}",
                        e
                    );
                }
            }
        }
        info!("Retention applied.");
        Ok(report)
    }
}
