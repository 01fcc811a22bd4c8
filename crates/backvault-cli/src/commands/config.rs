//! Configuration inspection CLI commands.

use clap::{Args, Subcommand};

use backvault_core::config::AppConfig;
use backvault_core::error::AppError;

use super::Cli;
use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration with secrets masked
    Show,
    /// Validate the configuration file
    Validate,
}

/// Execute config commands
pub async fn execute(args: &ConfigArgs, cli: &Cli) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = masked(cli.load_config()?);
            match cli.format {
                OutputFormat::Json => output::print_json(&config),
                OutputFormat::Table => print_summary(&config),
            }
        }
        ConfigCommand::Validate => match cli.load_config() {
            Ok(config) => {
                output::print_success(&format!(
                    "Configuration '{}' is valid",
                    cli.config.display()
                ));
                print_summary(&masked(config));
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}

/// Copy of `config` with credentials and database passwords masked
fn masked(mut config: AppConfig) -> AppConfig {
    let store = &mut config.object_store;
    if !store.access_key_id.is_empty() {
        store.access_key_id = output::mask_secret(&store.access_key_id);
    }
    if !store.secret_access_key.is_empty() {
        store.secret_access_key = output::mask_secret(&store.secret_access_key);
    }
    for job in &mut config.jobs {
        if let Some(password) = job.password.as_mut() {
            *password = "****".to_string();
        }
    }
    config
}

fn print_summary(config: &AppConfig) {
    let store = &config.object_store;
    println!("Object store:");
    output::print_kv("Provider", &store.provider);
    output::print_kv("Endpoint", &store.endpoint_url());
    output::print_kv("Region", &store.region);
    output::print_kv("Default bucket", store.default_bucket().unwrap_or("-"));
    output::print_kv("Access key", &store.access_key_id);
    output::print_kv("Secret key", &store.secret_access_key);

    let coordination = &config.coordination;
    println!("Coordination:");
    output::print_kv("Lock dir", &coordination.lock_dir.display().to_string());
    output::print_kv("Lock TTL", &format!("{}s", coordination.lock_ttl_seconds));
    output::print_kv("Tasks file", &coordination.tasks_file.display().to_string());
    output::print_kv("Tick", &format!("{}s", coordination.tick_interval_seconds));

    println!("Defaults:");
    output::print_kv("Prefix", &config.defaults.prefix);
    output::print_kv(
        "Presign expiration",
        &format!("{}s", config.defaults.presign_expiration),
    );

    println!("Jobs: {}", config.jobs.len());
    for job in &config.jobs {
        println!("  - {} ({})", job.display_name().unwrap_or("-"), job.kind());
    }
}
