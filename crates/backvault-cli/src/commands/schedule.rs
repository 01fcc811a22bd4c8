//! Scheduler mode.

use clap::Args;
use tokio::sync::watch;

use backvault_core::error::AppError;
use backvault_worker::IntervalScheduler;
use backvault_worker::signal::shutdown_signal;

use super::Cli;

/// Arguments for the schedule command
#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Jobs to schedule, comma separated (default: all with `every`)
    #[arg(short, long, value_delimiter = ',')]
    pub jobs: Vec<String>,

    /// Scheduler tick in seconds
    #[arg(long)]
    pub tick_interval: Option<u64>,

    /// Log uploads and deletions without performing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the schedule command. Runs until Ctrl+C or SIGTERM.
pub async fn execute(args: &ScheduleArgs, cli: &Cli) -> Result<(), AppError> {
    let mut config = cli.load_config()?;
    if let Some(tick) = args.tick_interval {
        config.coordination.tick_interval_seconds = tick;
    }

    let store = super::open_store(&config).await?;
    let scheduler = IntervalScheduler::from_config(
        super::coordinator(&config),
        super::pipeline(&config, store, args.dry_run),
        &config.coordination,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping scheduler...");
        let _ = shutdown_tx.send(true);
    });

    scheduler
        .run(&config.jobs, super::job_filter(&args.jobs), shutdown_rx)
        .await;
    Ok(())
}
