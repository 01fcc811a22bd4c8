//! Shared test helpers for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use backvault_core::config::AppConfig;
use backvault_core::traits::ObjectStore;
use backvault_worker::{BackupPipeline, Coordinator, JobExecutor};

/// Bucket every test job writes to.
pub const BUCKET: &str = "vault";

/// Isolated environment: config, local object store root, lock dir and registry.
pub struct TestEnv {
    /// Scratch directory holding everything below
    pub dir: TempDir,
    /// Loaded configuration
    pub config: AppConfig,
    /// Local object store
    pub store: Arc<dyn ObjectStore>,
}

impl TestEnv {
    /// Build an environment from the `[[jobs]]` (and optional `[defaults]`) TOML.
    pub async fn new(jobs_toml: &str) -> Self {
        Self::with_jobs(|_| jobs_toml.to_string()).await
    }

    /// Like [`TestEnv::new`], with the jobs TOML rendered from the scratch root.
    pub async fn with_jobs(render: impl FnOnce(&Path) -> String) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let jobs_toml = render(root);
        let toml = format!(
            r#"
[object_store]
provider = "local"
local_root = "{objects}"
bucket = "{BUCKET}"

[coordination]
lock_dir = "{locks}"
tasks_file = "{tasks}"
lock_ttl_seconds = 3600
tick_interval_seconds = 1
shutdown_grace_seconds = 10

{jobs_toml}
"#,
            objects = root.join("objects").display(),
            locks = root.join("locks").display(),
            tasks = root.join("registry/tasks.txt").display(),
        );

        let config = AppConfig::from_toml_str(&toml).expect("Failed to parse test config");
        config.validate().expect("Invalid test config");

        let store = backvault_storage::open_store(&config.object_store)
            .await
            .expect("Failed to open local store");
        store
            .ensure_bucket(BUCKET, None, false)
            .await
            .expect("Failed to create bucket");

        Self { dir, config, store }
    }

    /// Coordinator over this environment's lock dir and registry
    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::new(Coordinator::from_config(&self.config.coordination))
    }

    /// Backup pipeline with the built-in handlers
    pub fn pipeline(&self, dry_run: bool) -> Arc<BackupPipeline> {
        let executor = Arc::new(JobExecutor::with_builtin_handlers());
        Arc::new(BackupPipeline::new(self.store.clone(), executor, &self.config).with_dry_run(dry_run))
    }

    /// A path inside the scratch directory
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Registry file path
    pub fn tasks_file(&self) -> &Path {
        &self.config.coordination.tasks_file
    }

    /// Keys under `prefix` in the test bucket, sorted
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        self.store
            .list_objects(BUCKET, prefix)
            .await
            .expect("Failed to list objects")
            .into_iter()
            .map(|o| o.key)
            .collect()
    }

    /// Place an object directly in the store with a given age
    pub fn seed_object(&self, key: &str, age: Duration) {
        let path = self.path("objects").join(BUCKET).join(key);
        std::fs::create_dir_all(path.parent().expect("key has a parent")).unwrap();
        std::fs::write(&path, b"old backup").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    /// Write raw registry content
    pub fn write_registry(&self, content: &str) {
        let path = self.tasks_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Registry content, empty when the file is missing
    pub fn registry_content(&self) -> String {
        std::fs::read_to_string(self.tasks_file()).unwrap_or_default()
    }

    /// Whether any lock file exists
    pub fn has_lock_files(&self) -> bool {
        std::fs::read_dir(&self.config.coordination.lock_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .any(|e| e.file_name().to_string_lossy().starts_with("backup-lock-"))
            })
            .unwrap_or(false)
    }
}

/// Whole days as a duration
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}
