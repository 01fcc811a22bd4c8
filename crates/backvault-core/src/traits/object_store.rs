//! Object store trait for pluggable remote backup targets.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;

/// Upper bound on keys per bulk delete request imposed by S3-style APIs.
pub const MAX_DELETE_BATCH: usize = 1000;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectSummary {
    /// Full object key.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modified timestamp, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Trait for remote object storage backends.
///
/// Implementations exist for S3-compatible services and for a local
/// directory tree. The trait is defined here in `backvault-core` and
/// implemented in `backvault-storage`.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "s3", "local").
    fn provider_type(&self) -> &str;

    /// List every object under `prefix`, following pagination to the end.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> AppResult<Vec<ObjectSummary>>;

    /// Delete up to [`MAX_DELETE_BATCH`] keys in one quiet bulk request.
    ///
    /// Per-key failures inside the batch are not reported individually; a
    /// failed request surfaces as a single error.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> AppResult<()>;

    /// Upload a local file to `key`, returning the number of bytes sent.
    async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> AppResult<u64>;

    /// Produce a time-limited download URL for `key`.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
    -> AppResult<String>;

    /// List bucket names visible to the configured credentials.
    async fn list_buckets(&self) -> AppResult<Vec<String>>;

    /// Create `bucket` if it does not exist. Returns `true` when created.
    async fn ensure_bucket(&self, bucket: &str, region: Option<&str>, public: bool)
    -> AppResult<bool>;

    /// Apply (`public = true`) or remove a public-read policy on `bucket`.
    async fn set_bucket_visibility(&self, bucket: &str, public: bool) -> AppResult<()>;
}
