//! CLI command definitions and dispatch.

pub mod buckets;
pub mod config;
pub mod jobs;
pub mod retention;
pub mod run;
pub mod schedule;
pub mod status;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use backvault_core::config::AppConfig;
use backvault_core::error::AppError;
use backvault_core::traits::ObjectStore;
use backvault_worker::{BackupPipeline, Coordinator, JobExecutor, RunSummary};

use crate::output::{self, OutputFormat};

/// Backvault: scheduled backups to S3-compatible object storage
#[derive(Debug, Parser)]
#[command(name = "backvault", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/backvault.toml", env = "BACKVAULT_CONFIG")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory for per-job lock files
    #[arg(long)]
    pub lock_dir: Option<PathBuf>,

    /// Lock and registry TTL in seconds
    #[arg(long)]
    pub lock_ttl: Option<u64>,

    /// Shared task registry file
    #[arg(long)]
    pub tasks_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run jobs once
    Run(run::RunArgs),
    /// Run jobs on their `every` interval until interrupted
    Schedule(schedule::ScheduleArgs),
    /// Apply retention policies without producing backups
    Retention(retention::RetentionArgs),
    /// List configured jobs
    Jobs,
    /// Bucket management
    Buckets(buckets::BucketsArgs),
    /// Upload a single file
    Upload(upload::UploadArgs),
    /// Show registered runs
    Status,
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Run(args) => run::execute(args, self).await,
            Commands::Schedule(args) => schedule::execute(args, self).await,
            Commands::Retention(args) => retention::execute(args, self).await,
            Commands::Jobs => jobs::execute(self).await,
            Commands::Buckets(args) => buckets::execute(args, self).await,
            Commands::Upload(args) => upload::execute(args, self).await,
            Commands::Status => status::execute(self).await,
            Commands::Config(args) => config::execute(args, self).await,
        }
    }

    /// Load and validate configuration, then apply command-line overrides.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::load(&self.config)?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.lock_dir {
            config.coordination.lock_dir = dir.clone();
        }
        if let Some(ttl) = self.lock_ttl {
            config.coordination.lock_ttl_seconds = ttl;
        }
        if let Some(file) = &self.tasks_file {
            config.coordination.tasks_file = file.clone();
        }
    }
}

/// Helper: open the configured object store
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn ObjectStore>, AppError> {
    backvault_storage::open_store(&config.object_store).await
}

/// Helper: coordinator over the configured lock directory and registry
pub fn coordinator(config: &AppConfig) -> Arc<Coordinator> {
    Arc::new(Coordinator::from_config(&config.coordination))
}

/// Helper: backup pipeline with the built-in job handlers
pub fn pipeline(
    config: &AppConfig,
    store: Arc<dyn ObjectStore>,
    dry_run: bool,
) -> Arc<BackupPipeline> {
    let executor = Arc::new(JobExecutor::with_builtin_handlers());
    Arc::new(BackupPipeline::new(store, executor, config).with_dry_run(dry_run))
}

/// Helper: `None` when no job names were given
pub fn job_filter(names: &[String]) -> Option<&[String]> {
    if names.is_empty() { None } else { Some(names) }
}

/// Helper: print a run summary and turn failures into an error
pub fn report_summary(summary: &RunSummary, format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => output::print_json(summary),
        OutputFormat::Table => {
            println!("Summary:");
            output::print_kv("Ran", &summary.ran.join(", "));
            output::print_kv("Skipped", &summary.skipped.join(", "));
            output::print_kv("Failed", &summary.failed.join(", "));
        }
    }
    if summary.has_failures() {
        return Err(AppError::internal(format!(
            "{} job(s) failed",
            summary.failed.len()
        )));
    }
    Ok(())
}
