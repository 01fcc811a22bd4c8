//! Job listing.

use serde::Serialize;
use tabled::Tabled;

use backvault_core::config::JobConfig;
use backvault_core::error::AppError;

use super::Cli;
use crate::output;

/// Job display row
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    /// Job name
    name: String,
    /// Job type
    #[tabled(rename = "type")]
    #[serde(rename = "type")]
    job_type: String,
    /// Schedule interval as configured
    every: String,
    /// Target bucket
    bucket: String,
    /// Remote prefix
    prefix: String,
}

/// Execute the jobs command
pub async fn execute(cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let default_bucket = config.object_store.default_bucket();

    let rows: Vec<JobRow> = config
        .jobs
        .iter()
        .map(|job| JobRow {
            name: job.display_name().unwrap_or("-").to_string(),
            job_type: job.kind(),
            every: every_column(job),
            bucket: job.target_bucket(default_bucket).unwrap_or("-").to_string(),
            prefix: job.effective_prefix(&config.defaults),
        })
        .collect();

    output::print_list(&rows, cli.format);
    Ok(())
}

fn every_column(job: &JobConfig) -> String {
    match (&job.every, job.schedule_interval()) {
        (Some(raw), Some(interval)) => format!("{} ({}s)", raw, interval.as_secs()),
        (Some(raw), None) => format!("{} (not scheduled)", raw),
        (None, _) => "-".to_string(),
    }
}
