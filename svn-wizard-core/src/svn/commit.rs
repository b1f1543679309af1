// commit orchestration - one svn commit invocation per submitted selection

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use super::diff::SelectedFile;
use super::status::FileStatus;
use super::{SvnClient, peg_safe};
use crate::error::ProcessError;

lazy_static! {
    static ref COMMITTED_REVISION: Regex = Regex::new(r"Committed revision (\d+)\.").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub status: CommitStatus,
    pub message: String,
    /// new repository revision, when svn reported one
    pub revision: Option<u64>,
}

impl CommitResult {
    fn success(message: String, revision: Option<u64>) -> Self {
        Self {
            status: CommitStatus::Success,
            message,
            revision,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: CommitStatus::Failure,
            message: message.into(),
            revision: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommitStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Idle,
    Committing,
    Committed,
    Failed,
}

/// drives a commit through `Idle -> Committing -> Committed | Failed`.
///
/// it never refreshes status or clears selections; that is up to the caller
/// once it has looked at the result. failures are not retried.
pub struct CommitOrchestrator {
    client: SvnClient,
    state: CommitState,
}

pub(crate) fn parse_committed_revision(output: &str) -> Option<u64> {
    COMMITTED_REVISION
        .captures(output)
        .and_then(|c| c[1].parse().ok())
}

fn paths_with(files: &[SelectedFile], status: FileStatus) -> Vec<String> {
    files
        .iter()
        .filter(|f| f.status == status)
        .map(|f| peg_safe(&f.path))
        .collect()
}

fn failure_text(error: &ProcessError) -> String {
    match error {
        ProcessError::NonZeroExit { .. } => error.tool_message(),
        other => other.to_string(),
    }
}

impl CommitOrchestrator {
    pub fn new(client: SvnClient) -> Self {
        Self {
            client,
            state: CommitState::Idle,
        }
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    /// back to `Idle` after the caller has handled a finished commit
    pub fn reset(&mut self) {
        self.state = CommitState::Idle;
    }

    /// commit `files` with `message` in a single `svn commit`.
    ///
    /// unversioned files are scheduled with `svn add` and missing ones with
    /// `svn delete` first; if that preparation fails nothing is committed.
    /// when the commit itself fails, files added here are reverted to
    /// unversioned again; `svn delete` scheduling is left in place.
    pub async fn commit(&mut self, message: &str, files: &[SelectedFile]) -> CommitResult {
        if files.is_empty() {
            return CommitResult::failure("no files selected for commit");
        }
        if message.trim().is_empty() {
            return CommitResult::failure("commit message is empty");
        }

        let wc = match self.client.require_working_copy() {
            Ok(wc) => wc.to_path_buf(),
            Err(e) => return CommitResult::failure(e.to_string()),
        };

        self.state = CommitState::Committing;
        let result = self.run_commit(&wc, message, files).await;
        self.state = if result.is_success() {
            CommitState::Committed
        } else {
            CommitState::Failed
        };
        result
    }

    async fn run_commit(&self, wc: &Path, message: &str, files: &[SelectedFile]) -> CommitResult {
        let timeout = Some(self.client.default_timeout());

        let unversioned = paths_with(files, FileStatus::Unversioned);
        if !unversioned.is_empty() {
            let mut args = vec!["add".to_string(), "--parents".to_string(), "--".to_string()];
            args.extend(unversioned.iter().cloned());
            if let Err(e) = self.client.run_svn(wc, args, timeout).await {
                warn!(error = %e, "svn add failed before commit");
                return CommitResult::failure(failure_text(&e));
            }
        }

        let missing = paths_with(files, FileStatus::Missing);
        if !missing.is_empty() {
            let mut args = vec!["delete".to_string(), "--".to_string()];
            args.extend(missing);
            if let Err(e) = self.client.run_svn(wc, args, timeout).await {
                warn!(error = %e, "svn delete failed before commit");
                self.unschedule(wc, &unversioned).await;
                return CommitResult::failure(failure_text(&e));
            }
        }

        let mut args = vec![
            "commit".to_string(),
            "--force-log".to_string(),
            "-m".to_string(),
            message.to_string(),
            "--".to_string(),
        ];
        args.extend(files.iter().map(|f| peg_safe(&f.path)));

        // once handed to svn a commit runs to completion, so no timeout here
        match self.client.run_svn(wc, args, None).await {
            Ok(output) => {
                let revision = parse_committed_revision(&output.stdout);
                info!(?revision, files = files.len(), "commit succeeded");
                let text = match revision {
                    Some(r) => format!("Committed revision {r}."),
                    None => output.stdout.trim().to_string(),
                };
                CommitResult::success(text, revision)
            }
            Err(e) => {
                warn!(error = %e, "svn commit failed");
                self.unschedule(wc, &unversioned).await;
                CommitResult::failure(failure_text(&e))
            }
        }
    }

    /// undo the `svn add` of files that were unversioned before this commit.
    /// parent directories added by `--parents` stay scheduled.
    async fn unschedule(&self, wc: &Path, added: &[String]) {
        if added.is_empty() {
            return;
        }
        let mut args = vec![
            "revert".to_string(),
            "--depth".to_string(),
            "empty".to_string(),
            "--".to_string(),
        ];
        args.extend(added.iter().cloned());
        if let Err(e) = self
            .client
            .run_svn(wc, args, Some(self.client.default_timeout()))
            .await
        {
            warn!(error = %e, "failed to unschedule added files after a failed commit");
        }
    }
}

impl SvnClient {
    /// one-shot commit without keeping an orchestrator around
    pub async fn commit(&self, message: &str, files: &[SelectedFile]) -> CommitResult {
        CommitOrchestrator::new(self.clone()).commit(message, files).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn reads_committed_revision() {
        let out = "Sending        src/a.rs\nTransmitting file data .done\nCommitting transaction...\nCommitted revision 1235.\n";
        assert_eq!(parse_committed_revision(out), Some(1235));
        assert_eq!(parse_committed_revision("nothing"), None);
    }

    #[tokio::test]
    async fn empty_selection_fails_without_running_svn() {
        // no working copy is configured, so reaching svn would fail differently
        let mut orchestrator = CommitOrchestrator::new(SvnClient::new(Config::default()));
        let result = orchestrator.commit("feat: something", &[]).await;
        assert_eq!(result.status, CommitStatus::Failure);
        assert_eq!(result.message, "no files selected for commit");
        assert_eq!(orchestrator.state(), CommitState::Idle);
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let mut orchestrator = CommitOrchestrator::new(SvnClient::new(Config::default()));
        let files = [SelectedFile::new("a.rs", FileStatus::Modified)];
        let result = orchestrator.commit("   ", &files).await;
        assert!(!result.is_success());
        assert_eq!(result.message, "commit message is empty");
    }

    #[tokio::test]
    async fn missing_config_is_reported() {
        let mut orchestrator = CommitOrchestrator::new(SvnClient::new(Config::default()));
        let files = [SelectedFile::new("a.rs", FileStatus::Modified)];
        let result = orchestrator.commit("fix: x", &files).await;
        assert!(!result.is_success());
        assert!(result.message.contains("not configured"));
    }
}
