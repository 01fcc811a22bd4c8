//! Builds the configured object store.

use std::sync::Arc;

use backvault_core::config::ObjectStoreConfig;
use backvault_core::error::AppError;
use backvault_core::result::AppResult;
use backvault_core::traits::ObjectStore;

use crate::providers::LocalObjectStore;

/// Open the object store selected by `config.provider`.
pub async fn open_store(config: &ObjectStoreConfig) -> AppResult<Arc<dyn ObjectStore>> {
    match config.provider.to_lowercase().as_str() {
        "local" => {
            let store = LocalObjectStore::new(&config.local_root).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        "s3" | "b2" | "backblaze" => {
            let store = crate::providers::S3ObjectStore::new(config).await?;
            Ok(Arc::new(store))
        }
        other => Err(AppError::configuration(format!(
            "Unsupported object store provider '{other}'"
        ))),
    }
}
