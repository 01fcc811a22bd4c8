//! Backvault daemon: runs scheduled backup jobs until interrupted.
//!
//! Main entry point that wires the worker crate to the configured object
//! store and drives the interval scheduler.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use backvault_core::config::AppConfig;
use backvault_core::error::AppError;
use backvault_worker::signal::shutdown_signal;
use backvault_worker::{BackupPipeline, Coordinator, IntervalScheduler, JobExecutor};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Daemon error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("BACKVAULT_CONFIG").unwrap_or_else(|_| "config/backvault.toml".to_string());

    let config = AppConfig::load(&config_path)?;
    config.validate()?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main daemon run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Backvault v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Object store ─────────────────────────────────────
    tracing::info!(
        "Opening object store (provider: {})...",
        config.object_store.provider
    );
    let store = backvault_storage::open_store(&config.object_store).await?;

    // ── Step 2: Job body ─────────────────────────────────────────
    let executor = Arc::new(JobExecutor::with_builtin_handlers());
    tracing::info!("Job handlers: {}", executor.registered_types().join(", "));
    let pipeline = Arc::new(BackupPipeline::new(store, executor, &config));

    // ── Step 3: Scheduler ────────────────────────────────────────
    let coordinator = Arc::new(Coordinator::from_config(&config.coordination));
    let scheduler = IntervalScheduler::from_config(coordinator, pipeline, &config.coordination);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(&config.jobs, None, shutdown_rx).await;

    tracing::info!("Backvault daemon shut down");
    Ok(())
}
