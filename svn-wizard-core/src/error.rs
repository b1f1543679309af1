// error taxonomy for the svn integration layer

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// failure of a single subprocess invocation
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("'{program}' exited with code {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl ProcessError {
    /// the text the external tool wrote about its failure, if any
    pub fn tool_message(&self) -> String {
        match self {
            ProcessError::NonZeroExit { stderr, stdout, .. } => {
                if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                }
            }
            other => other.to_string(),
        }
    }
}

/// failure fetching one file's content
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("'{path}' not found{}", .revision.map(|r| format!(" at revision {r}")).unwrap_or_default())]
    NotFound { path: String, revision: Option<u64> },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// errors surfaced by svn operations
#[derive(Debug, Error)]
pub enum SvnError {
    #[error("{0} is not configured")]
    ConfigMissing(&'static str),

    #[error("configured path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("commit failed: {0}")]
    Commit(String),
}

pub type SvnResult<T> = Result<T, SvnError>;
