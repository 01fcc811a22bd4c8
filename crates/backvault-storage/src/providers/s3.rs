//! S3-compatible object store (Backblaze B2, AWS S3, MinIO).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{
    Builder as S3ConfigBuilder, Credentials, Region, RequestChecksumCalculation,
    ResponseChecksumValidation,
};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, Delete,
    ObjectIdentifier,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use backvault_core::config::ObjectStoreConfig;
use backvault_core::error::{AppError, ErrorKind};
use backvault_core::result::AppResult;
use backvault_core::traits::{MAX_DELETE_BATCH, ObjectStore, ObjectSummary};

/// S3-compatible object store client.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    endpoint: String,
}

impl S3ObjectStore {
    /// Build a client for the configured endpoint and credentials.
    pub async fn new(config: &ObjectStoreConfig) -> AppResult<Self> {
        if config.access_key_id.is_empty() || config.secret_access_key.is_empty() {
            return Err(AppError::configuration(
                "Missing object store credentials (object_store.access_key_id / object_store.secret_access_key)",
            ));
        }

        let endpoint = config.endpoint_url();
        info!(
            endpoint = %endpoint,
            region = %config.region,
            "Initializing S3 object store"
        );

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "backvault-config",
        );
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(credentials)
            .load()
            .await;

        // B2 rejects the default CRC checksum headers on uploads.
        let s3_config = S3ConfigBuilder::from(&shared)
            .force_path_style(config.force_path_style)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            endpoint,
        })
    }

    /// Endpoint URL the client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn sdk_error<E>(action: &str, err: E) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AppError::with_source(
        ErrorKind::ExternalService,
        format!("Failed to {action}: {}", DisplayErrorContext(&err)),
        err,
    )
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}

/// Bucket policy granting anonymous read on every object.
fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicRead",
            "Effect": "Allow",
            "Principal": "*",
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{bucket}/*")],
        }]
    })
    .to_string()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> AppResult<Vec<ObjectSummary>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("list objects", e))?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                objects.push(ObjectSummary {
                    key: key.to_string(),
                    size_bytes: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }
        }

        debug!(bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> AppResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        if keys.len() > MAX_DELETE_BATCH {
            return Err(AppError::validation(format!(
                "Delete batch of {} exceeds the limit of {MAX_DELETE_BATCH}",
                keys.len()
            )));
        }

        let identifiers = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Invalid object key", e))?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Invalid delete request", e)
            })?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_error("delete objects", e))?;

        let errors = output.errors();
        if !errors.is_empty() {
            warn!(
                bucket,
                failed = errors.len(),
                "Object store reported per-key delete failures"
            );
        }
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> AppResult<u64> {
        let size = tokio::fs::metadata(source).await?.len();
        let body = ByteStream::from_path(source).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open {} for upload", source.display()),
                e,
            )
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("upload s3://{bucket}/{key}"), e))?;
        Ok(size)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> AppResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in).map_err(|e| {
            AppError::with_source(ErrorKind::Validation, "Invalid presign expiration", e)
        })?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| sdk_error("presign download URL", e))?;
        Ok(request.uri().to_string())
    }

    async fn list_buckets(&self) -> AppResult<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error("list buckets", e))?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn ensure_bucket(
        &self,
        bucket: &str,
        region: Option<&str>,
        public: bool,
    ) -> AppResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!("Bucket already exists: {bucket}");
                return Ok(false);
            }
            Err(err) => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                let missing = matches!(status, Some(404))
                    || err
                        .as_service_error()
                        .map(|e| e.is_not_found())
                        .unwrap_or(false);
                if !missing {
                    return Err(sdk_error(&format!("check bucket {bucket}"), err));
                }
            }
        }

        let acl = if public {
            BucketCannedAcl::PublicRead
        } else {
            BucketCannedAcl::Private
        };
        let mut request = self.client.create_bucket().bucket(bucket).acl(acl);
        if let Some(region) = region.filter(|r| !r.is_empty()) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| sdk_error(&format!("create bucket {bucket}"), e))?;
        info!("Bucket created: {bucket}");

        if !self.list_buckets().await?.iter().any(|b| b == bucket) {
            warn!("Bucket {bucket} was created but does not appear in the bucket listing yet");
        }
        Ok(true)
    }

    async fn set_bucket_visibility(&self, bucket: &str, public: bool) -> AppResult<()> {
        if public {
            self.client
                .put_bucket_policy()
                .bucket(bucket)
                .policy(public_read_policy(bucket))
                .send()
                .await
                .map_err(|e| sdk_error(&format!("apply public policy to {bucket}"), e))?;
            info!("Public-read policy applied to bucket {bucket}");
        } else {
            match self.client.delete_bucket_policy().bucket(bucket).send().await {
                Ok(_) => info!("Removed public policy from bucket {bucket}"),
                Err(e) => info!(
                    "No policy removed from bucket {bucket}: {}",
                    DisplayErrorContext(&e)
                ),
            }
        }
        Ok(())
    }
}
