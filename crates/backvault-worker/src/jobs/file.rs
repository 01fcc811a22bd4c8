//! `file` jobs: upload one or more files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use backvault_core::types::naming::build_archive_name;

use crate::executor::{JobContext, JobExecutionError, JobHandler};
use crate::jobs::{archive, archive_base, missing_field};

/// Uploads each `source` file, optionally wrapped in a `tar.gz`.
#[derive(Debug, Default)]
pub struct FileJobHandler;

#[async_trait]
impl JobHandler for FileJobHandler {
    fn job_type(&self) -> &str {
        "file"
    }

    async fn execute(&self, ctx: JobContext<'_>) -> Result<Vec<PathBuf>, JobExecutionError> {
        let sources: Vec<&str> = ctx
            .job
            .source
            .as_ref()
            .map(|s| s.paths())
            .unwrap_or_default();
        if sources.is_empty() {
            return Err(missing_field("file", "'source'"));
        }

        let add_date = ctx.job.archive_name_snake_date(ctx.defaults);
        let mut artifacts = Vec::with_capacity(sources.len());
        for src in sources {
            let src_path = Path::new(src);
            let is_file = tokio::fs::metadata(src_path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                return Err(JobExecutionError::Permanent(format!("File not found: {src}")));
            }

            if ctx.job.compress {
                let stem = src_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("archive");
                let name = build_archive_name(archive_base(&ctx, stem), add_date, ctx.started_at);
                let out = ctx.workspace.join(name);
                artifacts.push(archive::tar_single_file(src_path, &out).await?);
            } else {
                artifacts.push(src_path.to_path_buf());
            }
        }
        Ok(artifacts)
    }
}
