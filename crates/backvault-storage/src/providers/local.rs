//! Local directory object store.
//!
//! Each bucket is a directory under the root and each key is a relative
//! file path inside it. Useful for dry runs against a NAS mount and for tests.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info};

use backvault_core::error::{AppError, ErrorKind};
use backvault_core::result::AppResult;
use backvault_core::traits::{MAX_DELETE_BATCH, ObjectStore, ObjectSummary};

/// Object store backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Root directory holding one sub-directory per bucket.
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at the given path, creating it when missing.
    pub async fn new(root: impl AsRef<Path>) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> AppResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(AppError::validation(format!("Invalid bucket name: '{bucket}'")));
        }
        Ok(self.root.join(bucket))
    }

    /// Resolve `key` inside `bucket`, refusing keys that escape the bucket.
    fn resolve(&self, bucket: &str, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::validation(format!("Invalid object key: '{key}'")));
        }
        Ok(self.bucket_dir(bucket)?.join(relative))
    }

    async fn require_bucket(&self, bucket: &str) -> AppResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(AppError::not_found(format!("Bucket not found: {bucket}")));
        }
        Ok(dir)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> AppResult<Vec<ObjectSummary>> {
        let bucket_dir = self.require_bucket(bucket).await?;
        let mut objects = Vec::new();
        let mut pending = vec![bucket_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to list directory: {}", dir.display()),
                    e,
                )
            })?;

            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&bucket_dir) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !key.starts_with(prefix) {
                    continue;
                }

                objects.push(ObjectSummary {
                    key,
                    size_bytes: meta.len(),
                    last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> AppResult<()> {
        if keys.len() > MAX_DELETE_BATCH {
            return Err(AppError::validation(format!(
                "Delete batch of {} exceeds the limit of {MAX_DELETE_BATCH}",
                keys.len()
            )));
        }

        let mut failed = 0usize;
        let mut last_error = None;
        for key in keys {
            let path = self.resolve(bucket, key)?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete {failed} of {} object(s)", keys.len()),
                e,
            ));
        }
        debug!(bucket, count = keys.len(), "Deleted objects");
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> AppResult<u64> {
        self.require_bucket(bucket).await?;
        let target = self.resolve(bucket, key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let bytes = fs::copy(source, &target).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to store {} as {key}", source.display()),
                e,
            )
        })?;
        debug!(bucket, key, bytes, "Stored object");
        Ok(bytes)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        _expires_in: Duration,
    ) -> AppResult<String> {
        let path = self.resolve(bucket, key)?;
        let absolute = std::path::absolute(&path).unwrap_or(path);
        Ok(format!("file://{}", absolute.display()))
    }

    async fn list_buckets(&self) -> AppResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn ensure_bucket(
        &self,
        bucket: &str,
        _region: Option<&str>,
        _public: bool,
    ) -> AppResult<bool> {
        let dir = self.bucket_dir(bucket)?;
        if fs::try_exists(&dir).await.unwrap_or(false) {
            info!("Bucket already exists: {bucket}");
            return Ok(false);
        }
        fs::create_dir_all(&dir).await?;
        info!("Bucket created: {bucket}");
        Ok(true)
    }

    async fn set_bucket_visibility(&self, bucket: &str, public: bool) -> AppResult<()> {
        self.require_bucket(bucket).await?;
        debug!(bucket, public, "Visibility is not tracked for local buckets");
        Ok(())
    }
}
