//! `directory` jobs: archive a directory tree.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use backvault_core::types::naming::build_archive_name;

use crate::executor::{JobContext, JobExecutionError, JobHandler};
use crate::jobs::{archive, archive_base, missing_field};

/// Produces one `tar.gz` of the `source` directory, honouring `exclude`.
#[derive(Debug, Default)]
pub struct DirectoryJobHandler;

#[async_trait]
impl JobHandler for DirectoryJobHandler {
    fn job_type(&self) -> &str {
        "directory"
    }

    async fn execute(&self, ctx: JobContext<'_>) -> Result<Vec<PathBuf>, JobExecutionError> {
        let src = ctx
            .job
            .source
            .as_ref()
            .and_then(|s| s.paths().into_iter().next())
            .ok_or_else(|| missing_field("directory", "'source'"))?;
        let src_path = Path::new(src);
        let is_dir = tokio::fs::metadata(src_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(JobExecutionError::Permanent(format!(
                "Directory not found: {src}"
            )));
        }

        let dir_name = src_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("archive");
        let name = build_archive_name(
            archive_base(&ctx, dir_name),
            ctx.job.archive_name_snake_date(ctx.defaults),
            ctx.started_at,
        );
        let out = ctx.workspace.join(name);
        let archive = archive::tar_directory(src_path, &out, &ctx.job.exclude).await?;
        Ok(vec![archive])
    }
}
