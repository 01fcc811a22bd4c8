//! `command` jobs: the artifact is whatever the command prints.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::executor::{JobContext, JobExecutionError, JobHandler};
use crate::jobs::missing_field;
use crate::jobs::process::ToolCommand;
use crate::lock::sanitize_job_name;

/// Runs `command` (split on whitespace) and captures stdout to `<job>.out`.
#[derive(Debug, Default)]
pub struct CommandJobHandler;

#[async_trait]
impl JobHandler for CommandJobHandler {
    fn job_type(&self) -> &str {
        "command"
    }

    async fn execute(&self, ctx: JobContext<'_>) -> Result<Vec<PathBuf>, JobExecutionError> {
        let cmd = ctx
            .job
            .command
            .as_deref()
            .and_then(ToolCommand::from_command_line)
            .ok_or_else(|| missing_field("command", "'command'"))?;

        let out = ctx
            .workspace
            .join(format!("{}.out", sanitize_job_name(ctx.job_name)));
        Ok(vec![cmd.run_to_file(&out).await?])
    }
}
