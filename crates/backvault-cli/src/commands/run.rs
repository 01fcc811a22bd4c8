//! One-shot job runs.

use clap::Args;

use backvault_core::error::AppError;
use backvault_worker::OneShotRunner;
use backvault_worker::runner::select_jobs;

use super::Cli;

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Jobs to run, comma separated (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub jobs: Vec<String>,

    /// Log uploads and deletions without performing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the run command
pub async fn execute(args: &RunArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let selected = select_jobs(&config.jobs, super::job_filter(&args.jobs))?;
    if selected.is_empty() {
        tracing::warn!("No jobs configured.");
        return Ok(());
    }

    let store = super::open_store(&config).await?;
    let runner = OneShotRunner::new(
        super::coordinator(&config),
        super::pipeline(&config, store, args.dry_run),
    );

    let summary = runner.run(&selected).await;
    super::report_summary(&summary, cli.format)
}
