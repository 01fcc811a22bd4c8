//! Backup pipeline: produce artifacts, upload, publish URLs, apply retention.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use backvault_core::config::{AppConfig, DefaultsConfig, JobConfig};
use backvault_core::traits::ObjectStore;
use backvault_core::types::naming::{job_prefix, object_key};
use backvault_storage::public_url::friendly_public_url;

use crate::coordinator::{Claim, Coordinator};
use crate::executor::{JobContext, JobExecutionError, JobExecutor};
use crate::retention::RetentionEngine;

/// Name prefix of the scoped temporary directory created for each run.
pub const WORKSPACE_PREFIX: &str = "b2-backup-";

/// The work performed for one claimed job run.
#[async_trait]
pub trait JobBody: Send + Sync + std::fmt::Debug + 'static {
    /// Run `job` using `workspace` for temporary files.
    async fn run(&self, job: &JobConfig, workspace: &Path) -> Result<(), JobExecutionError>;
}

/// Standard job body: executor, upload, URLs, retention.
#[derive(Debug, Clone)]
pub struct BackupPipeline {
    store: Arc<dyn ObjectStore>,
    executor: Arc<JobExecutor>,
    retention: RetentionEngine,
    defaults: DefaultsConfig,
    default_bucket: Option<String>,
    endpoint_host: String,
    dry_run: bool,
}

impl BackupPipeline {
    /// Build a pipeline for the given configuration.
    pub fn new(store: Arc<dyn ObjectStore>, executor: Arc<JobExecutor>, config: &AppConfig) -> Self {
        Self {
            retention: RetentionEngine::new(store.clone()),
            store,
            executor,
            defaults: config.defaults.clone(),
            default_bucket: config.object_store.default_bucket().map(str::to_string),
            endpoint_host: config.object_store.endpoint_host().to_string(),
            dry_run: false,
        }
    }

    /// Log uploads and deletions instead of performing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn publish(
        &self,
        bucket: &str,
        prefix: &str,
        job_name: &str,
        artifact: &Path,
        job: &JobConfig,
    ) -> Result<(), JobExecutionError> {
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                JobExecutionError::Permanent(format!("Artifact has no file name: {}", artifact.display()))
            })?;
        let key = object_key(prefix, job_name, &file_name, Utc::now());

        if self.dry_run {
            info!("[dry-run] Upload {} -> s3://{bucket}/{key}", artifact.display());
        } else {
            let bytes = self
                .store
                .put_object(bucket, &key, artifact)
                .await
                .map_err(|e| {
                    JobExecutionError::Transient(format!(
                        "Upload of {} failed: {e}",
                        artifact.display()
                    ))
                })?;
            info!(bytes, "Upload: {} -> s3://{bucket}/{key}", artifact.display());
        }

        let expiration = job.presign_expiration(&self.defaults);
        match self.store.presign_get(bucket, &key, expiration).await {
            Ok(url) => {
                let minutes = (expiration.as_secs() / 60).max(1);
                info!("Presigned ({minutes} min):\n{url}");
            }
            Err(e) => debug!(key, "Presign failed: {}", e),
        }
        if self.store.provider_type() == "s3" {
            if let Some(url) = friendly_public_url(&self.endpoint_host, bucket, &key) {
                info!("Public (if bucket is public):\n{url}");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl JobBody for BackupPipeline {
    async fn run(&self, job: &JobConfig, workspace: &Path) -> Result<(), JobExecutionError> {
        let job_name = job
            .display_name()
            .ok_or_else(|| JobExecutionError::Permanent("Job requires a 'name'.".to_string()))?;
        let bucket = job
            .target_bucket(self.default_bucket.as_deref())
            .ok_or_else(|| {
                JobExecutionError::Permanent(
                    "Job requires 'bucket' (no default bucket defined)".to_string(),
                )
            })?;
        let prefix = job.effective_prefix(&self.defaults);

        let ctx = JobContext {
            job,
            job_name,
            defaults: &self.defaults,
            workspace,
            started_at: Utc::now(),
        };
        let artifacts = self.executor.execute(ctx).await?;

        for artifact in &artifacts {
            self.publish(bucket, &prefix, job_name, artifact, job).await?;
        }

        self.retention
            .apply(
                bucket,
                &job_prefix(&prefix, job_name),
                job.effective_retention(&self.defaults),
                self.dry_run,
            )
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Retention failed: {e}")))?;
        Ok(())
    }
}

/// Create the scoped temporary directory for one run.
pub fn scoped_workspace() -> Result<TempDir, JobExecutionError> {
    tempfile::Builder::new()
        .prefix(WORKSPACE_PREFIX)
        .tempdir()
        .map_err(|e| JobExecutionError::Transient(format!("Failed to create workspace: {e}")))
}

/// Run `body` for `job` inside a fresh workspace.
///
/// The body runs on its own task so a panic is reported as a failure
/// instead of unwinding through the caller. The workspace is removed on
/// every exit path, including cancellation of the returned future.
pub async fn run_in_workspace(
    body: Arc<dyn JobBody>,
    job: JobConfig,
) -> Result<(), JobExecutionError> {
    let workspace = scoped_workspace()?;
    let path = workspace.path().to_path_buf();

    // Dropping the set aborts the body if this future is cancelled.
    let mut task = JoinSet::new();
    task.spawn(async move { body.run(&job, &path).await });

    let outcome = match task.join_next().await {
        Some(Ok(result)) => result,
        Some(Err(e)) if e.is_panic() => {
            let payload = e.into_panic();
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(JobExecutionError::Permanent(format!("Job panicked: {msg}")))
        }
        Some(Err(e)) => Err(JobExecutionError::Transient(format!("Job task cancelled: {e}"))),
        None => Err(JobExecutionError::Transient("Job task vanished".to_string())),
    };
    drop(workspace);
    outcome
}

/// Run a claimed job, log the outcome, and always release the claim.
pub async fn execute_claim(
    coordinator: &Coordinator,
    body: Arc<dyn JobBody>,
    job: JobConfig,
    claim: Claim,
) -> Result<(), JobExecutionError> {
    let result = run_in_workspace(body, job).await;
    match &result {
        Ok(()) => info!(job = %claim.job_name, task_id = %claim.task_id, "Job completed"),
        Err(e) => error!(job = %claim.job_name, task_id = %claim.task_id, "Job failed: {e}"),
    }
    coordinator.release(claim).await;
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use backvault_core::config::{RetentionPolicy, SourceSpec};
    use backvault_core::result::AppResult;
    use backvault_core::traits::ObjectSummary;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingStore {
        puts: Mutex<Vec<(String, String)>>,
        objects: Mutex<Vec<ObjectSummary>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        fn provider_type(&self) -> &str {
            "memory"
        }

        async fn list_objects(&self, _: &str, prefix: &str) -> AppResult<Vec<ObjectSummary>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.key.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn delete_objects(&self, _: &str, keys: &[String]) -> AppResult<()> {
            self.deletes.lock().unwrap().extend(keys.iter().cloned());
            Ok(())
        }

        async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> AppResult<u64> {
            let size = std::fs::metadata(source)?.len();
            self.puts
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string()));
            self.objects.lock().unwrap().push(ObjectSummary {
                key: key.to_string(),
                size_bytes: size,
                last_modified: Some(Utc::now()),
            });
            Ok(size)
        }

        async fn presign_get(&self, _: &str, key: &str, _: Duration) -> AppResult<String> {
            Ok(format!("memory://{key}"))
        }

        async fn list_buckets(&self) -> AppResult<Vec<String>> {
            Ok(vec!["vault".into()])
        }

        async fn ensure_bucket(&self, _: &str, _: Option<&str>, _: bool) -> AppResult<bool> {
            Ok(false)
        }

        async fn set_bucket_visibility(&self, _: &str, _: bool) -> AppResult<()> {
            Ok(())
        }
    }

    fn file_job(src: &Path) -> JobConfig {
        JobConfig {
            name: Some("notes".into()),
            job_type: Some("file".into()),
            bucket: Some("vault".into()),
            source: Some(SourceSpec::One(src.to_string_lossy().into_owned())),
            retention: Some(RetentionPolicy {
                max_keep: Some(1),
                max_age_days: None,
            }),
            ..JobConfig::default()
        }
    }

    fn pipeline(store: Arc<RecordingStore>) -> BackupPipeline {
        BackupPipeline::new(
            store,
            Arc::new(JobExecutor::with_builtin_handlers()),
            &AppConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_upload_key_and_retention() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        tokio::fs::write(&src, b"hello").await.unwrap();

        let store = Arc::new(RecordingStore::default());
        store.objects.lock().unwrap().push(ObjectSummary {
            key: "backups/notes/20000101-000000-notes.txt".into(),
            size_bytes: 1,
            last_modified: Some(Utc::now() - chrono::Duration::days(400)),
        });

        pipeline(store.clone())
            .run(&file_job(&src), dir.path())
            .await
            .unwrap();

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "vault");
        assert!(puts[0].1.starts_with("backups/notes/"));
        assert!(puts[0].1.ends_with("-notes.txt"));
        assert_eq!(
            *store.deletes.lock().unwrap(),
            vec!["backups/notes/20000101-000000-notes.txt".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        tokio::fs::write(&src, b"hello").await.unwrap();
        let store = Arc::new(RecordingStore::default());
        store.objects.lock().unwrap().extend([
            ObjectSummary {
                key: "backups/notes/a".into(),
                size_bytes: 1,
                last_modified: Some(Utc::now()),
            },
            ObjectSummary {
                key: "backups/notes/b".into(),
                size_bytes: 1,
                last_modified: Some(Utc::now() - chrono::Duration::days(1)),
            },
        ]);

        pipeline(store.clone())
            .with_dry_run(true)
            .run(&file_job(&src), dir.path())
            .await
            .unwrap();

        assert!(store.puts.lock().unwrap().is_empty());
        assert!(store.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_bucket_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = file_job(dir.path());
        job.bucket = None;
        let err = pipeline(Arc::new(RecordingStore::default()))
            .run(&job, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(msg) if msg.contains("bucket")));
    }

    #[derive(Debug)]
    struct PanickingBody;

    #[async_trait]
    impl JobBody for PanickingBody {
        async fn run(&self, _: &JobConfig, _: &Path) -> Result<(), JobExecutionError> {
            panic!("body exploded");
        }
    }

    #[derive(Debug, Default)]
    struct WorkspaceProbe {
        seen: Mutex<Option<std::path::PathBuf>>,
    }

    #[async_trait]
    impl JobBody for WorkspaceProbe {
        async fn run(&self, _: &JobConfig, workspace: &Path) -> Result<(), JobExecutionError> {
            assert!(workspace.is_dir());
            let name = workspace.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(WORKSPACE_PREFIX));
            *self.seen.lock().unwrap() = Some(workspace.to_path_buf());
            Err(JobExecutionError::Transient("boom".into()))
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let err = run_in_workspace(Arc::new(PanickingBody), JobConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(msg) if msg.contains("body exploded")));
    }

    #[tokio::test]
    async fn test_workspace_removed_after_failure() {
        let probe = Arc::new(WorkspaceProbe::default());
        let result = run_in_workspace(probe.clone(), JobConfig::default()).await;
        assert!(result.is_err());
        let seen = probe.seen.lock().unwrap().clone().unwrap();
        assert!(!seen.exists());
    }
}
