// working copy freshness - local revision vs repository HEAD

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{SvnClient, peg_safe};
use crate::error::SvnResult;

lazy_static! {
    static ref UPDATED_REVISION: Regex =
        Regex::new(r"(?m)^(?:At|Updated to) revision (\d+)\.").unwrap();
}

/// the fields of `svn info` output this tool cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoRecord {
    pub url: Option<String>,
    pub revision: Option<u64>,
    pub last_changed_author: Option<String>,
    pub last_changed_rev: Option<u64>,
    pub last_changed_date: Option<String>,
}

/// parse `svn info` key/value output; unknown or malformed lines are skipped
pub fn parse_info(output: &str) -> InfoRecord {
    let mut record = InfoRecord::default();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "URL" => record.url = Some(value.to_string()),
            "Revision" => record.revision = value.parse().ok(),
            "Last Changed Author" => record.last_changed_author = Some(value.to_string()),
            "Last Changed Rev" => record.last_changed_rev = value.parse().ok(),
            "Last Changed Date" => record.last_changed_date = Some(value.to_string()),
            _ => {}
        }
    }

    record
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    UpToDate,
    Behind,
    Unknown,
}

/// behind only when both revisions are known and the remote one is newer
pub fn classify(local: Option<u64>, remote: Option<u64>) -> Freshness {
    match (local, remote) {
        (Some(local), Some(remote)) if remote > local => Freshness::Behind,
        (Some(_), Some(_)) => Freshness::UpToDate,
        _ => Freshness::Unknown,
    }
}

/// result of comparing the working copy against the repository head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionState {
    pub local_revision: Option<u64>,
    pub remote_revision: Option<u64>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub classification: Freshness,
    pub checked_at: Option<DateTime<Utc>>,
}

impl RevisionState {
    pub fn unknown() -> Self {
        Self {
            local_revision: None,
            remote_revision: None,
            author: None,
            date: None,
            classification: Freshness::Unknown,
            checked_at: None,
        }
    }

    /// combine the working copy's info with the info at HEAD
    pub fn from_info(local: &InfoRecord, remote: &InfoRecord) -> Self {
        Self {
            local_revision: local.revision,
            remote_revision: remote.revision,
            author: remote.last_changed_author.clone(),
            date: remote.last_changed_date.clone(),
            classification: classify(local.revision, remote.revision),
            checked_at: Some(Utc::now()),
        }
    }

    pub fn is_behind(&self) -> bool {
        self.classification == Freshness::Behind
    }
}

impl Default for RevisionState {
    fn default() -> Self {
        Self::unknown()
    }
}

impl SvnClient {
    async fn info(&self, path: &str, head: bool) -> SvnResult<InfoRecord> {
        let wc = self.require_working_copy()?;
        let mut args = vec!["info".to_string()];
        if head {
            args.push("-r".to_string());
            args.push("HEAD".to_string());
        }
        args.push("--".to_string());
        args.push(peg_safe(path));

        let output = self.run_svn(wc, args, Some(self.default_timeout())).await?;
        Ok(parse_info(&output.stdout))
    }

    /// compare `path` (relative to the working copy, "." for its root) with HEAD.
    /// any failure classifies as unknown rather than erroring.
    pub async fn get_revision_info(&self, path: &str) -> RevisionState {
        let (local, remote) = tokio::join!(self.info(path, false), self.info(path, true));

        match (local, remote) {
            (Ok(local), Ok(remote)) => {
                let state = RevisionState::from_info(&local, &remote);
                debug!(
                    local = ?state.local_revision,
                    remote = ?state.remote_revision,
                    classification = ?state.classification,
                    "revision check"
                );
                state
            }
            (local, remote) => {
                if let Err(e) = &local {
                    debug!(error = %e, "local svn info failed");
                }
                if let Err(e) = &remote {
                    debug!(error = %e, "remote svn info failed");
                }
                RevisionState {
                    local_revision: local.ok().and_then(|r| r.revision),
                    checked_at: Some(Utc::now()),
                    ..RevisionState::unknown()
                }
            }
        }
    }

    /// `svn update` the whole working copy, returning the revision it ends at
    /// when svn reports one
    pub async fn update(&self) -> SvnResult<Option<u64>> {
        let wc = self.require_working_copy()?;
        let output = self
            .run_svn(wc, ["update"], Some(self.default_timeout()))
            .await?;

        let revision = parse_update_revision(&output.stdout);
        match revision {
            Some(revision) => info!(revision, "working copy updated"),
            None => debug!(output = %output.stdout.trim(), "update finished without a revision line"),
        }
        Ok(revision)
    }
}

pub fn parse_update_revision(output: &str) -> Option<u64> {
    UPDATED_REVISION
        .captures_iter(output)
        .last()
        .and_then(|c| c[1].parse().ok())
}

/// pollable revision state shared with whoever displays it.
///
/// both the interval poll and `refresh` write the same slot; whichever
/// query finishes last wins.
pub struct RevisionMonitor {
    client: SvnClient,
    path: String,
    state: Arc<watch::Sender<RevisionState>>,
    poll: Option<JoinHandle<()>>,
}

impl RevisionMonitor {
    pub fn new(client: SvnClient) -> Self {
        let (tx, _rx) = watch::channel(RevisionState::unknown());
        Self {
            client,
            path: ".".to_string(),
            state: Arc::new(tx),
            poll: None,
        }
    }

    pub fn current(&self) -> RevisionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RevisionState> {
        self.state.subscribe()
    }

    /// query now and publish the result
    pub async fn refresh(&self) -> RevisionState {
        let state = self.client.get_revision_info(&self.path).await;
        self.state.send_replace(state.clone());
        state
    }

    /// refresh once eagerly, then keep polling on the configured interval
    pub async fn start(&mut self) -> RevisionState {
        let first = self.refresh().await;

        self.stop();
        let client = self.client.clone();
        let path = self.path.clone();
        let state = Arc::clone(&self.state);
        let period = client.config().svn.poll_interval();

        self.poll = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately and the eager refresh already ran
            interval.tick().await;
            loop {
                interval.tick().await;
                let next = client.get_revision_info(&path).await;
                if next.classification == Freshness::Unknown {
                    warn!("revision poll could not determine working copy state");
                }
                state.send_replace(next);
            }
        }));

        first
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.abort();
        }
    }
}

impl Drop for RevisionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const LOCAL_INFO: &str = "Path: .
Working Copy Root Path: /home/dev/trunk
URL: https://svn.example.com/repo/trunk
Relative URL: ^/trunk
Repository Root: https://svn.example.com/repo
Revision: 1200
Node Kind: directory
Schedule: normal
Last Changed Author: alice
Last Changed Rev: 1198
Last Changed Date: 2024-05-01 10:00:00 +0200 (Wed, 01 May 2024)
";

    #[test]
    fn parses_info_fields() {
        let info = parse_info(LOCAL_INFO);
        assert_eq!(info.revision, Some(1200));
        assert_eq!(info.last_changed_rev, Some(1198));
        assert_eq!(info.last_changed_author.as_deref(), Some("alice"));
        assert_eq!(info.url.as_deref(), Some("https://svn.example.com/repo/trunk"));
        assert!(info.last_changed_date.unwrap().starts_with("2024-05-01 10:00:00"));
    }

    #[test]
    fn garbage_info_has_no_revision() {
        let info = parse_info("svn: E155007: '/tmp' is not a working copy\nRevision: abc\n");
        assert_eq!(info.revision, None);
    }

    #[test]
    fn classification_rules() {
        assert_eq!(classify(Some(10), Some(12)), Freshness::Behind);
        assert_eq!(classify(Some(12), Some(12)), Freshness::UpToDate);
        assert_eq!(classify(Some(13), Some(12)), Freshness::UpToDate);
        assert_eq!(classify(None, Some(12)), Freshness::Unknown);
        assert_eq!(classify(Some(12), None), Freshness::Unknown);
    }

    #[test]
    fn state_from_info_pairs() {
        let local = parse_info(LOCAL_INFO);
        let remote = parse_info("Revision: 1210\nLast Changed Author: bob\n");
        let state = RevisionState::from_info(&local, &remote);
        assert!(state.is_behind());
        assert_eq!(state.author.as_deref(), Some("bob"));
        assert_eq!(state.local_revision, Some(1200));
        assert_eq!(state.remote_revision, Some(1210));
    }

    #[test]
    fn update_revision_parsing() {
        assert_eq!(parse_update_revision("Updating '.':\nAt revision 88.\n"), Some(88));
        assert_eq!(
            parse_update_revision("Updating '.':\nU    a.rs\nUpdated to revision 91.\n"),
            Some(91)
        );
        assert_eq!(parse_update_revision("nothing useful"), None);
    }

    #[tokio::test]
    async fn unconfigured_client_reports_unknown() {
        let client = SvnClient::new(Config::default());
        let monitor = RevisionMonitor::new(client);
        assert_eq!(monitor.current().classification, Freshness::Unknown);
        let state = monitor.refresh().await;
        assert_eq!(state.classification, Freshness::Unknown);
        assert!(state.checked_at.is_some());
    }
}
