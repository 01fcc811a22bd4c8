//! Single-file upload CLI command.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::Serialize;

use backvault_core::error::AppError;
use backvault_storage::public_url::friendly_public_url;

use super::Cli;
use crate::output::{self, OutputFormat};

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Path to the file to upload
    pub file: PathBuf,

    /// Object key (default: the file name)
    #[arg(short, long)]
    pub key: Option<String>,

    /// Target bucket (default: object_store.bucket)
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Presigned URL lifetime in seconds (default: defaults.presign_expiration)
    #[arg(short, long)]
    pub expiration: Option<u64>,

    /// Print what would be uploaded without uploading
    #[arg(long)]
    pub dry_run: bool,
}

/// Upload result
#[derive(Debug, Serialize)]
struct UploadReport {
    bucket: String,
    key: String,
    bytes: Option<u64>,
    presigned_url: Option<String>,
    public_url: Option<String>,
}

/// Execute the upload command
pub async fn execute(args: &UploadArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;

    if !args.file.is_file() {
        return Err(AppError::not_found(format!(
            "File not found: {}",
            args.file.display()
        )));
    }
    let key = match &args.key {
        Some(k) if !k.is_empty() => k.clone(),
        _ => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::validation("Cannot derive an object key from the path"))?,
    };
    let bucket = args
        .bucket
        .as_deref()
        .or(config.object_store.default_bucket())
        .ok_or_else(|| {
            AppError::validation("A bucket must be defined (--bucket or object_store.bucket)")
        })?
        .to_string();
    let expiration = Duration::from_secs(
        args.expiration
            .filter(|s| *s > 0)
            .unwrap_or(config.defaults.presign_expiration),
    );

    let store = super::open_store(&config).await?;
    let bytes = if args.dry_run {
        None
    } else {
        Some(store.put_object(&bucket, &key, &args.file).await?)
    };

    let presigned_url = match store.presign_get(&bucket, &key, expiration).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!("Presign failed: {}", e);
            None
        }
    };
    let public_url = if store.provider_type() == "s3" {
        friendly_public_url(config.object_store.endpoint_host(), &bucket, &key)
    } else {
        None
    };

    let report = UploadReport {
        bucket,
        key,
        bytes,
        presigned_url,
        public_url,
    };

    match cli.format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => {
            if args.dry_run {
                output::print_warning("Dry run: nothing uploaded");
            }
            println!("Upload: {} -> bucket {}", report.key, report.bucket);
            if let Some(bytes) = report.bytes {
                output::print_kv("Size", &output::format_bytes(bytes));
            }
            if let Some(url) = &report.presigned_url {
                println!(
                    "Presigned ({} min):\n{}",
                    (expiration.as_secs() / 60).max(1),
                    url
                );
            }
            if let Some(url) = &report.public_url {
                println!("Public (if bucket is public):\n{}", url);
            }
        }
    }

    Ok(())
}
