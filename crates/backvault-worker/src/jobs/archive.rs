//! `tar.gz` archives built in-process.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use globset::{GlobBuilder, GlobMatcher};
use tar::Builder;

use backvault_core::error::AppError;

use crate::executor::JobExecutionError;

/// Exclude pattern matched from the right against an entry's full path.
///
/// A relative pattern with N components matches when the last N path
/// components match it one-for-one, so `*.log` matches any `.log` file and
/// `logs/*.log` only those directly inside a `logs` directory. A pattern
/// starting with `/` must match the whole path.
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    matcher: GlobMatcher,
    depth: usize,
    anchored: bool,
}

impl ExcludePattern {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self, JobExecutionError> {
        let anchored = pattern.starts_with('/');
        let trimmed = pattern.trim_matches('/');
        let depth = trimmed.split('/').filter(|c| !c.is_empty()).count();
        if depth == 0 {
            return Err(JobExecutionError::Permanent(format!(
                "Invalid exclude pattern '{pattern}': empty"
            )));
        }
        let matcher = GlobBuilder::new(trimmed)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                JobExecutionError::Permanent(format!("Invalid exclude pattern '{pattern}': {e}"))
            })?
            .compile_matcher();
        Ok(Self {
            matcher,
            depth,
            anchored,
        })
    }

    /// Whether `path` is excluded.
    pub fn matches(&self, path: &Path) -> bool {
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.len() < self.depth || (self.anchored && parts.len() != self.depth) {
            return false;
        }
        self.matcher.is_match(parts[parts.len() - self.depth..].join("/"))
    }
}

/// Archive the contents of `source_dir` into `output`.
///
/// Entries are stored relative to `source_dir`. An excluded directory is
/// skipped together with everything below it. Symlinks are stored as links.
pub async fn tar_directory(
    source_dir: &Path,
    output: &Path,
    excludes: &[String],
) -> Result<PathBuf, JobExecutionError> {
    let patterns = excludes
        .iter()
        .map(|p| ExcludePattern::new(p))
        .collect::<Result<Vec<_>, _>>()?;
    let source = source_dir.to_path_buf();
    let out = output.to_path_buf();
    write_archive(output, move || {
        let mut builder = open_builder(&out)?;
        append_tree(&mut builder, &source, Path::new(""), &patterns)?;
        finish(builder)
    })
    .await
}

/// Archive a single file into `output`, stored under its bare file name.
pub async fn tar_single_file(source: &Path, output: &Path) -> Result<PathBuf, JobExecutionError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| {
            JobExecutionError::Permanent(format!("Not a file path: {}", source.display()))
        })?
        .to_owned();
    let source = source.to_path_buf();
    let out = output.to_path_buf();
    write_archive(output, move || {
        let mut builder = open_builder(&out)?;
        builder.append_path_with_name(&source, &file_name)?;
        finish(builder)
    })
    .await
}

async fn write_archive<F>(output: &Path, build: F) -> Result<PathBuf, JobExecutionError>
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            JobExecutionError::Transient(format!(
                "Failed to create archive directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    tokio::task::spawn_blocking(build)
        .await
        .map_err(|e| {
            JobExecutionError::Internal(AppError::internal(format!("Archive task failed: {e}")))
        })?
        .map_err(|e| {
            JobExecutionError::Transient(format!(
                "Failed to write archive {}: {e}",
                output.display()
            ))
        })?;
    Ok(output.to_path_buf())
}

fn open_builder(output: &Path) -> io::Result<Builder<GzEncoder<File>>> {
    let file = File::create(output)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    Ok(builder)
}

fn finish(builder: Builder<GzEncoder<File>>) -> io::Result<()> {
    builder.into_inner()?.finish()?.sync_all()
}

fn append_tree(
    builder: &mut Builder<GzEncoder<File>>,
    dir: &Path,
    relative: &Path,
    excludes: &[ExcludePattern],
) -> io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if excludes.iter().any(|p| p.matches(&path)) {
            continue;
        }
        let name = relative.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            builder.append_dir(&name, &path)?;
            append_tree(builder, &path, &name, excludes)?;
        } else {
            builder.append_path_with_name(&path, &name)?;
        }
    }
    Ok(())
}
