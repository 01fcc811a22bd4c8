//! Backup job descriptors and per-job defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::interval::IntervalSpec;

/// Retention policy applied to a job's remote prefix.
///
/// A zero value means "unset", matching how the fields are usually left
/// out of the configuration entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep at most this many newest objects.
    #[serde(default)]
    pub max_keep: Option<u32>,
    /// Delete objects older than this many days.
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

impl RetentionPolicy {
    /// Keep-count, with zero treated as unset.
    pub fn keep(&self) -> Option<usize> {
        self.max_keep.filter(|n| *n > 0).map(|n| n as usize)
    }

    /// Maximum age in days, with zero treated as unset.
    pub fn age_days(&self) -> Option<u32> {
        self.max_age_days.filter(|n| *n > 0)
    }

    /// Whether the policy never deletes anything.
    pub fn is_noop(&self) -> bool {
        self.keep().is_none() && self.age_days().is_none()
    }

    /// Per-field merge: values set here win over `fallback`.
    pub fn or(self, fallback: RetentionPolicy) -> RetentionPolicy {
        RetentionPolicy {
            max_keep: self.max_keep.filter(|n| *n > 0).or(fallback.max_keep),
            max_age_days: self.max_age_days.filter(|n| *n > 0).or(fallback.max_age_days),
        }
    }
}

/// Values applied to every job that does not set its own (`[defaults]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Remote key prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Presigned URL lifetime in seconds.
    #[serde(default = "default_presign_expiration")]
    pub presign_expiration: u64,
    /// Append `_YYYYMMDD` to generated archive names.
    #[serde(default)]
    pub archive_name_snake_date: bool,
    /// Default retention policy.
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            presign_expiration: default_presign_expiration(),
            archive_name_snake_date: false,
            retention: RetentionPolicy::default(),
        }
    }
}

/// `source` may be a single path or a list of paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    /// One path.
    One(String),
    /// Several paths.
    Many(Vec<String>),
}

impl SourceSpec {
    /// All non-empty paths in declaration order.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::One(p) => vec![p.as_str()],
            Self::Many(ps) => ps.iter().map(String::as_str).collect(),
        }
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect()
    }
}

/// One backup job (`[[jobs]]`).
///
/// The descriptor is deliberately flat: which fields are required depends
/// on `type` and is checked by the handler for that type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name used for locks, the registry, and remote prefixes.
    pub name: Option<String>,
    /// Legacy alias for `name`.
    pub id: Option<String>,
    /// Job type: `file`, `directory`, `command`, `postgres`, `mysql`.
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    /// Target bucket (falls back to `object_store.bucket`).
    pub bucket: Option<String>,
    /// Remote key prefix (falls back to `defaults.prefix`).
    pub prefix: Option<String>,
    /// Schedule interval for scheduler mode.
    pub every: Option<IntervalSpec>,
    /// Retention override.
    pub retention: Option<RetentionPolicy>,
    /// Presigned URL lifetime override.
    pub presign_expiration: Option<u64>,
    /// Base name for generated archives.
    pub archive_name: Option<String>,
    /// Append `_YYYYMMDD` to generated archive names.
    pub archive_name_snake_date: Option<bool>,
    /// Source file(s) or directory.
    pub source: Option<SourceSpec>,
    /// Compress single files into `tar.gz` before upload.
    #[serde(default)]
    pub compress: bool,
    /// Glob patterns excluded from directory archives.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Command whose stdout becomes the artifact.
    pub command: Option<String>,
    /// Database host.
    pub host: Option<String>,
    /// Database port.
    pub port: Option<u16>,
    /// Database user.
    pub user: Option<String>,
    /// Database password.
    pub password: Option<String>,
    /// Database name.
    pub database: Option<String>,
}

impl JobConfig {
    /// Name used in logs, lock files and the registry: `name`, else `id`, else `type`.
    pub fn display_name(&self) -> Option<&str> {
        [&self.name, &self.id, &self.job_type]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
    }

    /// Lowercased job type, empty when missing.
    pub fn kind(&self) -> String {
        self.job_type.as_deref().unwrap_or("").to_lowercase()
    }

    /// Remote prefix for this job.
    pub fn effective_prefix(&self, defaults: &DefaultsConfig) -> String {
        non_empty(self.prefix.as_deref())
            .or(non_empty(Some(defaults.prefix.as_str())))
            .unwrap_or("backups")
            .to_string()
    }

    /// Retention policy with per-field fallback to the defaults.
    pub fn effective_retention(&self, defaults: &DefaultsConfig) -> RetentionPolicy {
        self.retention.unwrap_or_default().or(defaults.retention)
    }

    /// Target bucket, if any.
    pub fn target_bucket<'a>(&'a self, default_bucket: Option<&'a str>) -> Option<&'a str> {
        non_empty(self.bucket.as_deref()).or(non_empty(default_bucket))
    }

    /// Presigned URL lifetime.
    pub fn presign_expiration(&self, defaults: &DefaultsConfig) -> Duration {
        let secs = self
            .presign_expiration
            .filter(|s| *s > 0)
            .or(Some(defaults.presign_expiration).filter(|s| *s > 0))
            .unwrap_or(3600);
        Duration::from_secs(secs)
    }

    /// Whether generated archive names carry a date suffix.
    pub fn archive_name_snake_date(&self, defaults: &DefaultsConfig) -> bool {
        self.archive_name_snake_date
            .unwrap_or(defaults.archive_name_snake_date)
    }

    /// Positive schedule interval, or `None` when the job is not scheduled.
    pub fn schedule_interval(&self) -> Option<Duration> {
        self.every.as_ref().and_then(IntervalSpec::schedule_interval)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

fn default_prefix() -> String {
    "backups".to_string()
}

fn default_presign_expiration() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> JobConfig {
        JobConfig {
            name: Some(name.to_string()),
            job_type: Some("Directory".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut j = job("site");
        assert_eq!(j.display_name(), Some("site"));
        j.name = Some(String::new());
        j.id = Some("legacy".to_string());
        assert_eq!(j.display_name(), Some("legacy"));
        j.id = None;
        assert_eq!(j.display_name(), Some("Directory"));
        assert_eq!(j.kind(), "directory");
    }

    #[test]
    fn test_retention_merges_per_field() {
        let defaults = DefaultsConfig {
            retention: RetentionPolicy {
                max_keep: Some(7),
                max_age_days: Some(30),
            },
            ..Default::default()
        };
        let mut j = job("db");
        j.retention = Some(RetentionPolicy {
            max_keep: Some(2),
            max_age_days: None,
        });
        let policy = j.effective_retention(&defaults);
        assert_eq!(policy.keep(), Some(2));
        assert_eq!(policy.age_days(), Some(30));
    }

    #[test]
    fn test_zero_retention_is_noop() {
        let policy = RetentionPolicy {
            max_keep: Some(0),
            max_age_days: Some(0),
        };
        assert!(policy.is_noop());
        assert!(RetentionPolicy::default().is_noop());
    }

    #[test]
    fn test_prefix_and_bucket_fallbacks() {
        let defaults = DefaultsConfig::default();
        let mut j = job("db");
        assert_eq!(j.effective_prefix(&defaults), "backups");
        assert_eq!(j.target_bucket(Some("main")), Some("main"));
        assert_eq!(j.target_bucket(None), None);

        j.prefix = Some("nightly".to_string());
        j.bucket = Some("other".to_string());
        assert_eq!(j.effective_prefix(&defaults), "nightly");
        assert_eq!(j.target_bucket(Some("main")), Some("other"));
    }

    #[test]
    fn test_presign_expiration_fallback() {
        let defaults = DefaultsConfig::default();
        let mut j = job("db");
        assert_eq!(j.presign_expiration(&defaults), Duration::from_secs(3600));
        j.presign_expiration = Some(120);
        assert_eq!(j.presign_expiration(&defaults), Duration::from_secs(120));
    }

    #[test]
    fn test_source_paths() {
        let one = SourceSpec::One("/etc/hosts".to_string());
        assert_eq!(one.paths(), vec!["/etc/hosts"]);
        let many = SourceSpec::Many(vec!["a".into(), String::new(), "b".into()]);
        assert_eq!(many.paths(), vec!["a", "b"]);
    }
}
