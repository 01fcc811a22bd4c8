//! Advisory, TTL-based job locks.
//!
//! A lock is a small file `<lock_dir>/backup-lock-<sanitized-name>.lock`
//! holding `acquired_at|pid|hostname`. A lock younger than the TTL is held;
//! an older one is stale and may be overwritten.
//!
//! Staleness is checked before the new record is written, so two processes
//! racing on a stale lock can both acquire it. Duplicate backup runs are
//! wasteful but not corrupting, and the weak guarantee is accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use backvault_core::config::CoordinationConfig;
use backvault_core::types::host;

/// File name prefix of every lock file.
pub const LOCK_FILE_PREFIX: &str = "backup-lock-";

/// Best-effort mutual exclusion per job name.
///
/// Implementations never raise: any failure to acquire is reported as
/// `false` so the caller simply skips the job this cycle.
#[async_trait]
pub trait JobLock: Send + Sync + std::fmt::Debug {
    /// Try to take the lock for `job_name`.
    async fn acquire(&self, job_name: &str, ttl: Duration) -> bool;

    /// Drop the lock for `job_name`. Releasing a missing lock is not an error.
    async fn release(&self, job_name: &str);
}

/// Parsed contents of a lock file.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRecord {
    /// Seconds since the Unix epoch when the lock was written.
    pub acquired_at: f64,
    /// Owner process id.
    pub pid: Option<u32>,
    /// Owner hostname.
    pub host: Option<String>,
}

impl LockRecord {
    /// Parse `acquired_at|pid|hostname`. Only the timestamp is required.
    pub fn parse(content: &str) -> Option<Self> {
        let mut parts = content.trim().split('|');
        let acquired_at = parts
            .next()?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|ts| ts.is_finite())?;
        let pid = parts.next().and_then(|p| p.trim().parse().ok());
        let host = parts
            .next()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        Some(Self {
            acquired_at,
            pid,
            host,
        })
    }

    /// Serialize as a lock file body.
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}",
            self.acquired_at,
            self.pid.map(|p| p.to_string()).unwrap_or_default(),
            self.host.as_deref().unwrap_or_default()
        )
    }

    /// Whether the record is still within `ttl` at time `now`.
    pub fn is_held_at(&self, ttl: Duration, now: f64) -> bool {
        now - self.acquired_at < ttl.as_secs_f64()
    }
}

/// What a lock file currently contains.
#[derive(Debug, Clone, PartialEq)]
pub enum LockFileState {
    /// No lock file.
    Missing,
    /// A file whose timestamp cannot be parsed; treated as stale.
    Unparseable,
    /// A well-formed record.
    Present(LockRecord),
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// Distinct names that sanitize to the same token share a lock.
pub fn sanitize_job_name(job_name: &str) -> String {
    job_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Lock files in a local (or shared) directory.
#[derive(Debug, Clone)]
pub struct FileJobLock {
    /// Directory holding the lock files.
    lock_dir: PathBuf,
}

impl FileJobLock {
    /// Create a lock manager writing into `lock_dir`.
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    /// Create a lock manager from the coordination settings.
    pub fn from_config(config: &CoordinationConfig) -> Self {
        Self::new(config.lock_dir.clone())
    }

    /// Directory holding the lock files.
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Path of the lock file for `job_name`.
    pub fn lock_path(&self, job_name: &str) -> PathBuf {
        self.lock_dir.join(format!(
            "{LOCK_FILE_PREFIX}{}.lock",
            sanitize_job_name(job_name)
        ))
    }

    /// Read the current state of the lock file for `job_name`.
    pub async fn read_state(&self, job_name: &str) -> std::io::Result<LockFileState> {
        match fs::read_to_string(self.lock_path(job_name)).await {
            Ok(content) => Ok(LockRecord::parse(&content)
                .map(LockFileState::Present)
                .unwrap_or(LockFileState::Unparseable)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LockFileState::Missing),
            Err(e) => Err(e),
        }
    }

    /// [`JobLock::acquire`] against an explicit clock.
    pub async fn acquire_at(&self, job_name: &str, ttl: Duration, now: f64) -> bool {
        match self.read_state(job_name).await {
            Ok(LockFileState::Present(record)) if record.is_held_at(ttl, now) => {
                debug!(
                    job = job_name,
                    age_secs = now - record.acquired_at,
                    "Lock is held"
                );
                return false;
            }
            Ok(LockFileState::Unparseable) => {
                debug!(job = job_name, "Lock file is unreadable, treating as stale");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(job = job_name, "Failed to read lock file: {}", e);
                return false;
            }
        }

        let record = LockRecord {
            acquired_at: now,
            pid: Some(host::current_pid()),
            host: Some(host::current_hostname()),
        };
        let path = self.lock_path(job_name);
        let written = async {
            fs::create_dir_all(&self.lock_dir).await?;
            fs::write(&path, record.to_line()).await
        }
        .await;

        match written {
            Ok(()) => {
                debug!(job = job_name, path = %path.display(), "Lock acquired");
                true
            }
            Err(e) => {
                warn!(job = job_name, path = %path.display(), "Failed to write lock file: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl JobLock for FileJobLock {
    async fn acquire(&self, job_name: &str, ttl: Duration) -> bool {
        self.acquire_at(job_name, ttl, host::unix_now()).await
    }

    async fn release(&self, job_name: &str) {
        let path = self.lock_path(job_name);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(job = job_name, "Lock released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job = job_name, path = %path.display(), "Failed to remove lock file: {}", e),
        }
    }
}
