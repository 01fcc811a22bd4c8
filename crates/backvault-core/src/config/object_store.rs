//! Object store connection configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Remote object store settings (`[object_store]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Provider: `"s3"` for any S3-compatible endpoint, `"local"` for a directory tree.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Endpoint host or URL. A bare host is reached over HTTPS.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Signing region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Access key ID.
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: String,
    /// Default bucket for jobs that do not name one.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Use path-style addressing instead of virtual-hosted buckets.
    #[serde(default)]
    pub force_path_style: bool,
    /// Root directory for the `local` provider.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
}

impl ObjectStoreConfig {
    /// Endpoint as a full URL.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("https://{}", self.endpoint)
        }
    }

    /// Endpoint host without scheme or trailing slash.
    pub fn endpoint_host(&self) -> &str {
        let host = self
            .endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.endpoint);
        host.trim_end_matches('/')
    }

    /// Default bucket, ignoring empty strings.
    pub fn default_bucket(&self) -> Option<&str> {
        self.bucket.as_deref().filter(|b| !b.is_empty())
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: None,
            force_path_style: false,
            local_root: default_local_root(),
        }
    }
}

fn default_provider() -> String {
    "s3".to_string()
}

fn default_endpoint() -> String {
    "s3.us-east-005.backblazeb2.com".to_string()
}

fn default_region() -> String {
    "us-east-005".to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data/objects")
}
