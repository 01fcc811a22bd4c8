//! Archive file names and remote object keys.

use chrono::{DateTime, Utc};

/// Normalize free text into `snake_lower` form.
///
/// Runs of characters outside `[a-z0-9]` collapse into a single `_`;
/// leading and trailing underscores are trimmed. Empty results fall back
/// to `"archive"`.
pub fn to_snake_lower(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending_sep = false;
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        "archive".to_string()
    } else {
        out
    }
}

/// Build a `.tar.gz` archive name from a base name.
///
/// With `add_date`, the UTC date of `now` is appended as `_YYYYMMDD`.
pub fn build_archive_name(base: &str, add_date: bool, now: DateTime<Utc>) -> String {
    let base_clean = to_snake_lower(base);
    if add_date {
        format!("{base_clean}_{}.tar.gz", now.format("%Y%m%d"))
    } else {
        format!("{base_clean}.tar.gz")
    }
}

/// Remote prefix under which all artifacts of a job live.
pub fn job_prefix(prefix: &str, job_name: &str) -> String {
    format!("{}/{job_name}", prefix.trim_end_matches('/'))
}

/// Remote key for one uploaded artifact: `<prefix>/<job>/<YYYYMMDD-HHMMSS>-<file>`.
pub fn object_key(prefix: &str, job_name: &str, file_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}-{file_name}",
        job_prefix(prefix, job_name),
        now.format("%Y%m%d-%H%M%S")
    )
}
