//! Short, collision-resistant identifiers for in-flight task records.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::types::host;

/// Length of a task identifier in hex characters.
pub const TASK_ID_LEN: usize = 16;

/// Identifier written into the task registry for one job execution.
///
/// Derived from the job name, host, a microsecond timestamp and random
/// bits, then hashed so the token is short and free of the `|` separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh task identifier for `job_name`.
    pub fn generate(job_name: &str) -> Self {
        let now = Utc::now().format("%Y%m%d-%H%M%S-%6f");
        let rand = Uuid::new_v4().simple().to_string();
        let base = format!(
            "{job_name}-{}-{now}-{}",
            host::current_hostname(),
            &rand[..8]
        );
        let digest = Sha256::digest(base.as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(TASK_ID_LEN);
        Self(id)
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains('|') || s.contains('\n') {
            return Err(AppError::validation(format!("Invalid task id: {s:?}")));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
