//! Retention-only sweeps.

use clap::Args;

use backvault_core::error::AppError;
use backvault_worker::runner::select_jobs;
use backvault_worker::{RetentionEngine, RetentionRunner};

use super::Cli;

/// Arguments for the retention command
#[derive(Debug, Args)]
pub struct RetentionArgs {
    /// Jobs to sweep, comma separated (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub jobs: Vec<String>,

    /// List deletions without performing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the retention command
pub async fn execute(args: &RetentionArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let selected = select_jobs(&config.jobs, super::job_filter(&args.jobs))?;

    let store = super::open_store(&config).await?;
    let runner = RetentionRunner::new(
        super::coordinator(&config),
        RetentionEngine::new(store),
        &config,
    )
    .with_dry_run(args.dry_run);

    let summary = runner.run(&selected).await;
    super::report_summary(&summary, cli.format)
}
