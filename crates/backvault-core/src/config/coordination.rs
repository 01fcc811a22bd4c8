//! Lock, registry, and scheduler tick configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Coordination settings shared by the scheduler and one-shot runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Directory holding per-job lock files.
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
    /// Age in seconds after which a lock or registry record is stale.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_seconds: u64,
    /// Path of the shared task registry file.
    #[serde(default = "default_tasks_file")]
    pub tasks_file: PathBuf,
    /// Scheduler polling interval in seconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// How long the scheduler waits for in-flight jobs on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl CoordinationConfig {
    /// Lock and registry TTL.
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    /// Scheduler tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    /// Shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            lock_dir: default_lock_dir(),
            lock_ttl_seconds: default_lock_ttl(),
            tasks_file: default_tasks_file(),
            tick_interval_seconds: default_tick_interval(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_lock_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_lock_ttl() -> u64 {
    6 * 60 * 60
}

fn default_tasks_file() -> PathBuf {
    PathBuf::from("/tmp/backvault/tasks.txt")
}

fn default_tick_interval() -> u64 {
    10
}

fn default_shutdown_grace() -> u64 {
    30
}
