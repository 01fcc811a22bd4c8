//! External tool execution (archivers, database dump tools, user commands).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs;
use tokio::process::Command;
use tracing;

use crate::executor::JobExecutionError;

/// Maximum number of stderr characters written to the log.
const STDERR_LOG_LIMIT: usize = 2000;

/// A program invocation with arguments and extra environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program name or path.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Environment variables added to the inherited environment.
    pub envs: Vec<(String, String)>,
}

impl ToolCommand {
    /// Invocation of `program` without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Split a command line on whitespace. No shell quoting is applied.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Command line as logged.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command with its stdout written to `output`.
    pub async fn run_to_file(&self, output: &Path) -> Result<PathBuf, JobExecutionError> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                JobExecutionError::Transient(format!(
                    "Failed to create output directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let file = fs::File::create(output).await.map_err(|e| {
            JobExecutionError::Transient(format!(
                "Failed to create output file {}: {e}",
                output.display()
            ))
        })?;
        let file = file.into_std().await;

        self.run_with_stdout(Stdio::from(file)).await?;
        Ok(output.to_path_buf())
    }

    async fn run_with_stdout(&self, stdout: Stdio) -> Result<(), JobExecutionError> {
        tracing::info!("$ {}", self.display());

        let child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    JobExecutionError::Permanent(format!("Command not found: {}", self.program))
                } else {
                    JobExecutionError::Transient(format!(
                        "Failed to start '{}': {e}",
                        self.program
                    ))
                }
            })?;

        let output = child.wait_with_output().await.map_err(|e| {
            JobExecutionError::Transient(format!("Failed to wait for '{}': {e}", self.program))
        })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                program = %self.program,
                exit_code = code,
                "Command stderr: {}",
                stderr.chars().take(STDERR_LOG_LIMIT).collect::<String>()
            );
            return Err(JobExecutionError::Transient(format!(
                "Command failed with code {code}"
            )));
        }
        Ok(())
    }
}
