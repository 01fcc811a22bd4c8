//! Bucket management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use backvault_core::error::AppError;

use super::Cli;
use crate::output;

/// Arguments for bucket commands
#[derive(Debug, Args)]
pub struct BucketsArgs {
    /// Bucket subcommand
    #[command(subcommand)]
    pub command: BucketsCommand,
}

/// Bucket subcommands
#[derive(Debug, Subcommand)]
pub enum BucketsCommand {
    /// List buckets visible to the configured credentials
    List,
    /// Create a bucket (no-op when it exists)
    Create {
        /// Bucket name (default: object_store.bucket)
        #[arg(short, long)]
        name: Option<String>,
        /// Make the bucket publicly readable
        #[arg(long)]
        public: bool,
        /// Skip the confirmation prompt for public buckets
        #[arg(short, long)]
        yes: bool,
    },
}

/// Bucket display row
#[derive(Debug, Serialize, Tabled)]
struct BucketRow {
    /// Bucket name
    name: String,
}

/// Execute bucket commands
pub async fn execute(args: &BucketsArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let store = super::open_store(&config).await?;

    match &args.command {
        BucketsCommand::List => {
            let rows: Vec<BucketRow> = store
                .list_buckets()
                .await?
                .into_iter()
                .map(|name| BucketRow { name })
                .collect();
            output::print_list(&rows, cli.format);
        }
        BucketsCommand::Create { name, public, yes } => {
            let target = name
                .as_deref()
                .or(config.object_store.default_bucket())
                .ok_or_else(|| {
                    AppError::validation(
                        "Please provide --name or define object_store.bucket in the configuration.",
                    )
                })?;

            if *public && !*yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("Make bucket '{}' publicly readable?", target))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;
                if !confirmed {
                    output::print_warning("Aborted.");
                    return Ok(());
                }
            }

            let created = store
                .ensure_bucket(target, Some(config.object_store.region.as_str()), *public)
                .await?;
            if created {
                output::print_success(&format!("Bucket '{}' created", target));
            } else {
                output::print_success(&format!("Bucket '{}' already exists", target));
                if *public {
                    store.set_bucket_visibility(target, true).await?;
                    output::print_success(&format!("Bucket '{}' is now public", target));
                }
            }
        }
    }

    Ok(())
}
