//! Interval scheduler for jobs carrying an `every` interval.
//!
//! Claims are taken synchronously in configuration order; each claimed run
//! is dispatched onto its own task and its entry is marked in-flight until
//! that task reports back. A skipped firing is rescheduled one interval
//! later, never retried sooner.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tracing;

use backvault_core::config::{CoordinationConfig, JobConfig};

use crate::coordinator::{ClaimOutcome, Coordinator};
use crate::pipeline::{JobBody, execute_claim};

/// One scheduled job.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    /// Job descriptor.
    pub job: JobConfig,
    /// Display name used for claims.
    pub job_name: String,
    /// Interval between runs.
    pub interval: Duration,
    /// Next time the entry is due.
    pub next_run: Instant,
    /// Whether a worker is currently running this entry.
    pub in_flight: bool,
}

/// Build entries for jobs with a positive interval, all due at `now`.
///
/// With a filter, only the named jobs are scheduled, in the filter's order;
/// unknown names are ignored.
pub fn build_entries(jobs: &[JobConfig], filter: Option<&[String]>, now: Instant) -> Vec<ScheduleEntry> {
    let selected: Vec<&JobConfig> = match filter {
        Some(names) => names
            .iter()
            .filter_map(|n| jobs.iter().find(|j| j.display_name() == Some(n.as_str())))
            .collect(),
        None => jobs.iter().collect(),
    };

    selected
        .into_iter()
        .filter_map(|job| {
            let job_name = job.display_name()?.to_string();
            let interval = job.schedule_interval()?;
            Some(ScheduleEntry {
                job: job.clone(),
                job_name,
                interval,
                next_run: now,
                in_flight: false,
            })
        })
        .collect()
}

/// Time until the earliest idle entry is due, if any entry is idle.
pub fn until_next_due(entries: &[ScheduleEntry], now: Instant) -> Option<Duration> {
    entries
        .iter()
        .filter(|e| !e.in_flight)
        .map(|e| e.next_run.saturating_duration_since(now))
        .min()
}

/// Horizon used when `from + interval` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 86_400);

/// Next due time one `interval` after `from`, clamped on overflow.
pub fn next_due(from: Instant, interval: Duration) -> Instant {
    from.checked_add(interval)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Loop sleep: `max(1s, min(tick, until_next_due))`, in whole seconds.
pub fn compute_sleep(tick: Duration, until_next_due: Option<Duration>) -> Duration {
    let secs = match until_next_due {
        Some(due) => tick.as_secs().min(due.as_secs()),
        None => tick.as_secs(),
    };
    Duration::from_secs(secs.max(1))
}

/// Mark the entry behind a finished worker idle and due one interval later.
///
/// A worker that failed to join (panicked or was cancelled) frees its entry
/// the same way, so the job keeps firing.
pub fn complete(
    entries: &mut [ScheduleEntry],
    running: &mut HashMap<Id, usize>,
    joined: Result<(Id, ()), JoinError>,
) {
    let id = match joined {
        Ok((id, ())) => id,
        Err(e) => {
            tracing::error!("Scheduler worker task failed: {}", e);
            e.id()
        }
    };
    if let Some(entry) = running.remove(&id).and_then(|index| entries.get_mut(index)) {
        entry.in_flight = false;
        entry.next_run = next_due(Instant::now(), entry.interval);
    }
}

/// Interval scheduler driving a [`JobBody`] through a [`Coordinator`].
#[derive(Debug)]
pub struct IntervalScheduler {
    coordinator: Arc<Coordinator>,
    body: Arc<dyn JobBody>,
    tick: Duration,
    shutdown_grace: Duration,
}

impl IntervalScheduler {
    /// Create a scheduler.
    pub fn new(
        coordinator: Arc<Coordinator>,
        body: Arc<dyn JobBody>,
        tick: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            coordinator,
            body,
            tick,
            shutdown_grace,
        }
    }

    /// Create a scheduler using the configured tick and shutdown grace.
    pub fn from_config(
        coordinator: Arc<Coordinator>,
        body: Arc<dyn JobBody>,
        config: &CoordinationConfig,
    ) -> Self {
        Self::new(coordinator, body, config.tick_interval(), config.shutdown_grace())
    }

    /// Run until `cancel` flips to `true` (or its sender is dropped).
    ///
    /// Returns immediately when no job has a positive interval.
    pub async fn run(
        &self,
        jobs: &[JobConfig],
        filter: Option<&[String]>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut entries = build_entries(jobs, filter, Instant::now());
        if entries.is_empty() {
            tracing::info!("No jobs with 'every' configured. Exiting schedule mode.");
            return;
        }

        if let Err(e) = self.coordinator.registry().ensure().await {
            tracing::warn!("Task registry unavailable: {}", e);
        }
        tracing::info!(
            "Scheduler started with {} job(s). Tick={}s",
            entries.len(),
            self.tick.as_secs()
        );

        let mut workers: JoinSet<()> = JoinSet::new();
        let mut running: HashMap<Id, usize> = HashMap::new();

        loop {
            if *cancel.borrow() {
                break;
            }

            self.dispatch_due(&mut entries, &mut workers, &mut running).await;

            let sleep_for = compute_sleep(self.tick, until_next_due(&entries, Instant::now()));
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Scheduler received shutdown signal");
                        break;
                    }
                }
                Some(joined) = workers.join_next_with_id(), if !workers.is_empty() => {
                    complete(&mut entries, &mut running, joined);
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }

        self.drain(workers).await;
        tracing::info!("Scheduler stopped");
    }

    /// Claim and dispatch every idle entry that is due.
    async fn dispatch_due(
        &self,
        entries: &mut [ScheduleEntry],
        workers: &mut JoinSet<()>,
        running: &mut HashMap<Id, usize>,
    ) {
        let now = Instant::now();
        for (index, entry) in entries.iter_mut().enumerate() {
            if entry.in_flight || entry.next_run > now {
                continue;
            }

            match self.coordinator.try_claim(&entry.job_name).await {
                ClaimOutcome::Registered => {
                    tracing::info!(
                        "Another run is registered for job '{}'. Skipping this schedule tick.",
                        entry.job_name
                    );
                    entry.next_run = next_due(now, entry.interval);
                }
                ClaimOutcome::Locked => {
                    tracing::info!(
                        "Another run is in progress for job '{}'. Skipping this schedule tick.",
                        entry.job_name
                    );
                    entry.next_run = next_due(now, entry.interval);
                }
                ClaimOutcome::Claimed(claim) => {
                    entry.in_flight = true;
                    let coordinator = Arc::clone(&self.coordinator);
                    let body = Arc::clone(&self.body);
                    let job = entry.job.clone();
                    let handle = workers.spawn(async move {
                        let _ = execute_claim(&coordinator, body, job, claim).await;
                    });
                    running.insert(handle.id(), index);
                }
            }
        }
    }

    /// Wait up to the grace period for running workers, then abort the rest.
    async fn drain(&self, mut workers: JoinSet<()>) {
        if workers.is_empty() {
            return;
        }
        tracing::info!(
            "Waiting up to {}s for {} running job(s)...",
            self.shutdown_grace.as_secs(),
            workers.len()
        );

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "Aborting {} job(s) still running after the grace period; their claims expire by TTL",
                workers.len()
            );
            workers.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use backvault_core::types::IntervalSpec;

    use super::*;
    use crate::executor::JobExecutionError;
    use crate::lock::{FileJobLock, JobLock};
    use crate::registry::TaskRegistry;

    fn job(name: &str, every: Option<&str>) -> JobConfig {
        JobConfig {
            name: Some(name.into()),
            job_type: Some("command".into()),
            every: every.map(|e| IntervalSpec::Text(e.into())),
            ..JobConfig::default()
        }
    }

    fn coordinator(dir: &tempfile::TempDir) -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            Arc::new(FileJobLock::new(dir.path().join("locks"))),
            TaskRegistry::new(dir.path().join("tasks.txt")),
            Duration::from_secs(3600),
        ))
    }

    #[derive(Debug, Default)]
    struct CountingBody {
        started: AtomicUsize,
        finished: AtomicUsize,
        hold: Duration,
        panic: bool,
    }

    #[async_trait]
    impl JobBody for CountingBody {
        async fn run(&self, _: &JobConfig, workspace: &Path) -> Result<(), JobExecutionError> {
            assert!(workspace.is_dir());
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            if self.panic {
                panic!("job body panicked");
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn run_for(
        scheduler: IntervalScheduler,
        jobs: Vec<JobConfig>,
        filter: Option<Vec<String>>,
        cancel_after: Duration,
    ) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            scheduler.run(&jobs, filter.as_deref(), rx).await;
        });
        tokio::time::sleep(cancel_after).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_build_entries_skips_unscheduled() {
        let jobs = vec![
            job("a", Some("5m")),
            job("b", None),
            job("c", Some("bogus")),
            job("d", Some("0")),
            job("e", Some("30s")),
        ];
        let entries = build_entries(&jobs, None, Instant::now());
        let names: Vec<&str> = entries.iter().map(|e| e.job_name.as_str()).collect();
        assert_eq!(names, vec!["a", "e"]);
        assert_eq!(entries[0].interval, Duration::from_secs(300));
    }

    #[test]
    fn test_build_entries_filter_order() {
        let jobs = vec![job("a", Some("1m")), job("b", Some("1m")), job("c", Some("1m"))];
        let filter = vec!["c".to_string(), "missing".to_string(), "a".to_string()];
        let entries = build_entries(&jobs, Some(&filter), Instant::now());
        let names: Vec<&str> = entries.iter().map(|e| e.job_name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[test]
    fn test_compute_sleep_bounds() {
        let tick = Duration::from_secs(10);
        assert_eq!(compute_sleep(tick, None), tick);
        assert_eq!(compute_sleep(tick, Some(Duration::from_secs(3600))), tick);
        assert_eq!(
            compute_sleep(tick, Some(Duration::from_millis(4900))),
            Duration::from_secs(4)
        );
        assert_eq!(compute_sleep(tick, Some(Duration::ZERO)), Duration::from_secs(1));
        assert_eq!(compute_sleep(Duration::ZERO, None), Duration::from_secs(1));
    }

    #[test]
    fn test_until_next_due_ignores_in_flight() {
        let now = Instant::now();
        let mut entries = build_entries(
            &[job("a", Some("1m")), job("b", Some("1m"))],
            None,
            now,
        );
        entries[0].in_flight = true;
        entries[1].next_run = now + Duration::from_secs(42);
        assert_eq!(until_next_due(&entries, now), Some(Duration::from_secs(42)));
        entries[1].in_flight = true;
        assert_eq!(until_next_due(&entries, now), None);
    }

    #[test]
    fn test_next_due_clamps_huge_intervals() {
        let now = Instant::now();
        assert_eq!(next_due(now, Duration::from_secs(60)), now + Duration::from_secs(60));
        let far = next_due(now, Duration::from_secs(i64::MAX as u64));
        assert!(far > now + Duration::from_secs(365 * 86_400));
        assert_eq!(next_due(now, Duration::MAX), far);
    }

    #[tokio::test]
    async fn test_failed_worker_frees_its_entry() {
        let now = Instant::now();
        let mut entries = build_entries(&[job("a", Some("1m"))], None, now);
        entries[0].in_flight = true;

        let mut workers: JoinSet<()> = JoinSet::new();
        let mut running = HashMap::new();
        let handle = workers.spawn(async { panic!("worker panicked") });
        running.insert(handle.id(), 0);

        let joined = workers.join_next_with_id().await.unwrap();
        assert!(joined.is_err());
        complete(&mut entries, &mut running, joined);

        assert!(!entries[0].in_flight);
        assert!(entries[0].next_run >= now + Duration::from_secs(60));
        assert!(running.is_empty());
    }

    #[tokio::test]
    async fn test_huge_interval_runs_once_without_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir);
        let body = Arc::new(CountingBody::default());
        let scheduler = IntervalScheduler::new(
            coordinator.clone(),
            body.clone(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );
        let mut rare = job("rare", None);
        rare.every = Some(IntervalSpec::Seconds(i64::MAX));

        run_for(scheduler, vec![rare], None, Duration::from_millis(1500)).await;

        assert_eq!(body.finished.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_registered("rare").await);
    }

    #[tokio::test]
    async fn test_no_entries_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let body = Arc::new(CountingBody::default());
        let scheduler = IntervalScheduler::new(
            coordinator(&dir),
            body.clone(),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        let (_tx, rx) = watch::channel(false);
        tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(&[job("a", None)], None, rx),
        )
        .await
        .unwrap();
        assert_eq!(body.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_runs_due_job_and_releases_claim() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir);
        let body = Arc::new(CountingBody::default());
        let scheduler = IntervalScheduler::new(
            coordinator.clone(),
            body.clone(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );

        run_for(scheduler, vec![job("db", Some("1s"))], None, Duration::from_millis(1500)).await;

        let runs = body.finished.load(Ordering::SeqCst);
        assert!((1..=3).contains(&runs), "unexpected run count {runs}");
        assert!(!coordinator.is_registered("db").await);
        assert!(!dir.path().join("locks/backup-lock-db.lock").exists());
    }

    #[tokio::test]
    async fn test_in_flight_job_is_not_redispatched() {
        let dir = tempfile::tempdir().unwrap();
        let body = Arc::new(CountingBody {
            hold: Duration::from_millis(2500),
            ..CountingBody::default()
        });
        let scheduler = IntervalScheduler::new(
            coordinator(&dir),
            body.clone(),
            Duration::from_secs(1),
            Duration::from_secs(10),
        );

        run_for(scheduler, vec![job("slow", Some("1s"))], None, Duration::from_millis(2000)).await;

        // The grace period lets the single run finish.
        assert_eq!(body.started.load(Ordering::SeqCst), 1);
        assert_eq!(body.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registered_job_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir);
        coordinator
            .registry()
            .add("db", &backvault_core::types::TaskId::generate("db"))
            .await;
        let body = Arc::new(CountingBody::default());
        let scheduler = IntervalScheduler::new(
            coordinator.clone(),
            body.clone(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        run_for(scheduler, vec![job("db", Some("1s"))], None, Duration::from_millis(1200)).await;
        assert_eq!(body.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_locked_job_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileJobLock::new(dir.path().join("locks"));
        assert!(lock.acquire("db", Duration::from_secs(3600)).await);
        let body = Arc::new(CountingBody::default());
        let scheduler = IntervalScheduler::new(
            coordinator(&dir),
            body.clone(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        run_for(scheduler, vec![job("db", Some("1s"))], None, Duration::from_millis(1200)).await;
        assert_eq!(body.started.load(Ordering::SeqCst), 0);
        // The foreign lock is untouched.
        assert!(lock.lock_path("db").exists());
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_scheduler() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir);
        let body = Arc::new(CountingBody {
            panic: true,
            ..CountingBody::default()
        });
        let scheduler = IntervalScheduler::new(
            coordinator.clone(),
            body.clone(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );

        run_for(scheduler, vec![job("boom", Some("1s"))], None, Duration::from_millis(2500)).await;

        assert!(body.started.load(Ordering::SeqCst) >= 2);
        assert!(!coordinator.is_registered("boom").await);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let body = Arc::new(CountingBody {
            hold: Duration::from_secs(30),
            ..CountingBody::default()
        });
        let scheduler = IntervalScheduler::new(
            coordinator(&dir),
            body.clone(),
            Duration::from_secs(1),
            Duration::from_millis(200),
        );

        let started = std::time::Instant::now();
        run_for(scheduler, vec![job("stuck", Some("1m"))], None, Duration::from_millis(300)).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(body.started.load(Ordering::SeqCst), 1);
        assert_eq!(body.finished.load(Ordering::SeqCst), 0);
    }
}
