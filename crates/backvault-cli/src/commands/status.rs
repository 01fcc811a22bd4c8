//! Task registry status.

use serde::Serialize;
use tabled::Tabled;

use backvault_core::error::AppError;
use backvault_core::types::host::unix_now;
use backvault_worker::registry::TaskRegistry;

use super::Cli;
use crate::output;

/// Registry display row
#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    /// Job name
    job: String,
    /// Task identifier
    task_id: String,
    /// Owning process
    pid: String,
    /// Owning host
    host: String,
    /// Time since the run was registered
    age: String,
    /// Whether the record is within the TTL
    active: bool,
}

/// Execute the status command. Reads the registry without compacting it.
pub async fn execute(cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let registry = TaskRegistry::from_config(&config.coordination);
    let ttl = config.coordination.lock_ttl().as_secs_f64();
    let now = unix_now();

    let rows: Vec<TaskRow> = registry
        .snapshot()
        .await?
        .into_iter()
        .map(|record| {
            let age = record.age_at(now);
            TaskRow {
                job: record.job_name,
                task_id: record.task_id,
                pid: record.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                host: record.host.unwrap_or_else(|| "-".into()),
                age: output::format_age(age),
                active: age < ttl,
            }
        })
        .collect();

    output::print_list(&rows, cli.format);
    Ok(())
}
