//! Shared ledger of in-flight task records.
//!
//! One `started_at|job_name|task_id|pid|hostname` line per running task.
//! Writers append without taking any file lock; each record is a single
//! newline-terminated write. Reads compact the file by dropping records
//! older than the TTL and malformed lines, rewriting it only when something
//! was dropped, so repeated reads leave the file byte-identical.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use backvault_core::config::CoordinationConfig;
use backvault_core::error::{AppError, ErrorKind};
use backvault_core::result::AppResult;
use backvault_core::types::{TaskId, host};

/// One line of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    /// Seconds since the Unix epoch when the task started.
    pub started_at: f64,
    /// Job display name.
    pub job_name: String,
    /// Task identifier.
    pub task_id: String,
    /// Owner process id (diagnostic).
    pub pid: Option<u32>,
    /// Owner hostname (diagnostic).
    pub host: Option<String>,
}

impl TaskRecord {
    /// Record for a task of `job_name` started now by this process.
    pub fn new_local(job_name: &str, task_id: &TaskId, started_at: f64) -> Self {
        Self {
            started_at,
            job_name: job_name.to_string(),
            task_id: task_id.to_string(),
            pid: Some(host::current_pid()),
            host: Some(host::current_hostname()),
        }
    }

    /// Parse one line. Lines with fewer than three fields or a bad
    /// timestamp are malformed.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 3 {
            return None;
        }
        let started_at = parts[0]
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|ts| ts.is_finite())?;
        Some(Self {
            started_at,
            job_name: parts[1].to_string(),
            task_id: parts[2].to_string(),
            pid: parts.get(3).and_then(|p| p.trim().parse().ok()),
            host: parts
                .get(4)
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
        })
    }

    /// Serialize without the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.started_at,
            self.job_name,
            self.task_id,
            self.pid.map(|p| p.to_string()).unwrap_or_default(),
            self.host.as_deref().unwrap_or_default()
        )
    }

    /// Age in seconds at `now`.
    pub fn age_at(&self, now: f64) -> f64 {
        now - self.started_at
    }
}

/// Append/compact/snapshot access to the registry file.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    /// Registry file path.
    path: PathBuf,
}

impl TaskRegistry {
    /// Registry stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry at the configured `tasks_file`.
    pub fn from_config(config: &CoordinationConfig) -> Self {
        Self::new(config.tasks_file.clone())
    }

    /// Registry file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file and its parent directory when absent.
    pub async fn ensure(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create registry directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create registry file: {}", self.path.display()),
                    e,
                )
            })?;
        Ok(())
    }

    /// Append one record as a single newline-terminated write.
    pub async fn append(&self, record: &TaskRecord) -> AppResult<()> {
        self.ensure().await?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        let line = format!("{}\n", record.to_line());
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Parse every well-formed record without modifying the file.
    pub async fn snapshot(&self) -> AppResult<Vec<TaskRecord>> {
        Ok(self
            .read_lines()
            .await?
            .iter()
            .filter_map(|line| TaskRecord::parse(line))
            .collect())
    }

    /// Drop stale and malformed records, returning the fresh ones.
    ///
    /// A record is fresh while its age is below `ttl`. The file is only
    /// rewritten when at least one line was dropped.
    pub async fn compact_at(&self, ttl: Duration, now: f64) -> AppResult<Vec<TaskRecord>> {
        let lines = self.read_lines().await?;
        let ttl_secs = ttl.as_secs_f64();

        let mut kept_lines = Vec::with_capacity(lines.len());
        let mut fresh = Vec::with_capacity(lines.len());
        for line in &lines {
            match TaskRecord::parse(line) {
                Some(record) if record.age_at(now) < ttl_secs => {
                    kept_lines.push(line.as_str());
                    fresh.push(record);
                }
                _ => {}
            }
        }

        if kept_lines.len() != lines.len() {
            debug!(
                dropped = lines.len() - kept_lines.len(),
                path = %self.path.display(),
                "Compacting task registry"
            );
            self.rewrite(&kept_lines).await?;
        }
        Ok(fresh)
    }

    /// Names of jobs with a fresh record, compacting the file as a side effect.
    ///
    /// Read errors are logged and yield an empty set.
    pub async fn active_jobs_at(&self, ttl: Duration, now: f64) -> HashSet<String> {
        match self.compact_at(ttl, now).await {
            Ok(records) => records.into_iter().map(|r| r.job_name).collect(),
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read task registry: {}", e);
                HashSet::new()
            }
        }
    }

    /// [`Self::active_jobs_at`] against the current clock.
    pub async fn active_jobs(&self, ttl: Duration) -> HashSet<String> {
        self.active_jobs_at(ttl, host::unix_now()).await
    }

    /// Append a record for a task that starts now. Best effort.
    pub async fn add(&self, job_name: &str, task_id: &TaskId) {
        let record = TaskRecord::new_local(job_name, task_id, host::unix_now());
        if let Err(e) = self.append(&record).await {
            warn!(job = job_name, task_id = %task_id, "Failed to register task: {}", e);
        }
    }

    /// Rewrite the file without records whose task id matches. Best effort.
    pub async fn remove(&self, task_id: &TaskId) {
        if let Err(e) = self.try_remove(task_id).await {
            warn!(task_id = %task_id, "Failed to remove task from registry: {}", e);
        }
    }

    async fn try_remove(&self, task_id: &TaskId) -> AppResult<()> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        let lines = self.read_lines().await?;
        let kept: Vec<&str> = lines
            .iter()
            .map(String::as_str)
            .filter(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                !(parts.len() >= 3 && parts[2] == task_id.as_str())
            })
            .collect();
        if kept.len() == lines.len() {
            return Ok(());
        }
        self.rewrite(&kept).await
    }

    async fn read_lines(&self) -> AppResult<Vec<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read registry: {}", self.path.display()),
                e,
            )),
        }
    }

    async fn rewrite(&self, lines: &[&str]) -> AppResult<()> {
        let mut content = lines.join("\n");
        if !lines.is_empty() {
            content.push('\n');
        }
        fs::write(&self.path, content).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to rewrite registry: {}", self.path.display()),
                e,
            )
        })
    }
}
