//! `postgres` and `mysql` jobs: capture a logical dump.

use std::path::PathBuf;

use async_trait::async_trait;
use backvault_core::config::JobConfig;

use crate::executor::{JobContext, JobExecutionError, JobHandler};
use crate::jobs::missing_field;
use crate::jobs::process::ToolCommand;
use crate::lock::sanitize_job_name;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbEngine {
    /// PostgreSQL via `pg_dump`.
    Postgres,
    /// MySQL / MariaDB via `mysqldump`.
    MySql,
}

impl DbEngine {
    fn job_type(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::MySql => 3306,
        }
    }
}

/// Dumps a database to `<job>.sql` with the engine's dump tool.
#[derive(Debug)]
pub struct DatabaseJobHandler {
    engine: DbEngine,
}

impl DatabaseJobHandler {
    /// Handler for `postgres` jobs.
    pub fn postgres() -> Self {
        Self {
            engine: DbEngine::Postgres,
        }
    }

    /// Handler for `mysql` jobs.
    pub fn mysql() -> Self {
        Self {
            engine: DbEngine::MySql,
        }
    }

    /// Dump command for `job`. Passwords travel through the environment.
    pub fn dump_command(&self, job: &JobConfig) -> Result<ToolCommand, JobExecutionError> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let (Some(database), Some(user)) = (non_empty(&job.database), non_empty(&job.user)) else {
            return Err(missing_field(
                self.engine.job_type(),
                "'database' and 'user'",
            ));
        };
        let host = non_empty(&job.host).unwrap_or_else(|| "localhost".to_string());
        let port = job.port.unwrap_or(self.engine.default_port()).to_string();
        let password = non_empty(&job.password);

        let cmd = match self.engine {
            DbEngine::Postgres => {
                let cmd = ToolCommand::new("pg_dump")
                    .args(["-h", host.as_str(), "-p", port.as_str(), "-U", user.as_str(), database.as_str()]);
                match password {
                    Some(pw) => cmd.env("PGPASSWORD", pw),
                    None => cmd,
                }
            }
            DbEngine::MySql => {
                let cmd = ToolCommand::new("mysqldump")
                    .args(["-h", host.as_str(), "-P", port.as_str(), "-u", user.as_str(), database.as_str()]);
                match password {
                    Some(pw) => cmd.env("MYSQL_PWD", pw),
                    None => cmd,
                }
            }
        };
        Ok(cmd)
    }
}

#[async_trait]
impl JobHandler for DatabaseJobHandler {
    fn job_type(&self) -> &str {
        self.engine.job_type()
    }

    async fn execute(&self, ctx: JobContext<'_>) -> Result<Vec<PathBuf>, JobExecutionError> {
        let cmd = self.dump_command(ctx.job)?;
        let out = ctx
            .workspace
            .join(format!("{}.sql", sanitize_job_name(ctx.job_name)));
        Ok(vec![cmd.run_to_file(&out).await?])
    }
}
