// `svn log` - recent revisions of a path, used to pick a revision to compare against

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SvnClient, peg_safe};
use crate::error::SvnResult;

lazy_static! {
    static ref ENTRY_HEADER: Regex =
        Regex::new(r"^r(\d+) \| ([^|]*) \| ([^|]*) \| (\d+) lines?$").unwrap();
}

const ENTRY_SEPARATOR: &str =
    "------------------------------------------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub revision: u64,
    pub author: String,
    pub date: String,
    pub message: String,
}

/// parse the default text format of `svn log`
pub fn parse_log(output: &str) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    let mut lines = output.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(caps) = ENTRY_HEADER.captures(line.trim_end()) else {
            continue;
        };
        let Ok(revision) = caps[1].parse::<u64>() else {
            continue;
        };
        let line_count: usize = caps[4].parse().unwrap_or(0);

        // blank line between header and message
        if lines.peek().is_some_and(|l| l.is_empty()) {
            lines.next();
        }

        let mut message_lines = Vec::with_capacity(line_count);
        for _ in 0..line_count {
            match lines.peek() {
                Some(l) if *l != ENTRY_SEPARATOR => {
                    message_lines.push(*l);
                    lines.next();
                }
                _ => break,
            }
        }

        entries.push(LogEntry {
            revision,
            author: caps[2].trim().to_string(),
            date: caps[3].trim().to_string(),
            message: message_lines.join("\n").trim_end().to_string(),
        });
    }

    entries
}

impl SvnClient {
    /// the most recent `limit` log entries touching `path`
    pub async fn log(&self, path: &str, limit: usize) -> SvnResult<Vec<LogEntry>> {
        let Some(wc) = self.working_copy()? else {
            return Ok(Vec::new());
        };
        let args = vec![
            "log".to_string(),
            "-l".to_string(),
            limit.max(1).to_string(),
            "--".to_string(),
            peg_safe(path),
        ];
        let output = self.run_svn(wc, args, Some(self.default_timeout())).await?;
        let entries = parse_log(&output.stdout);
        debug!(path, count = entries.len(), "svn log");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_with_multi_line_messages() {
        let output = "------------------------------------------------------------------------
r1234 | alice | 2024-05-01 10:00:00 +0200 (Wed, 01 May 2024) | 2 lines

fix: handle empty status output
second line
------------------------------------------------------------------------
r1230 | bob | 2024-04-30 09:12:44 +0200 (Tue, 30 Apr 2024) | 1 line

init
------------------------------------------------------------------------
";
        let entries = parse_log(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].revision, 1234);
        assert_eq!(entries[0].author, "alice");
        assert_eq!(entries[0].message, "fix: handle empty status output\nsecond line");
        assert_eq!(entries[1].revision, 1230);
        assert_eq!(entries[1].message, "init");
    }

    #[test]
    fn empty_messages_are_kept() {
        let output = "------------------------------------------------------------------------
r7 | (no author) | 2024-01-01 00:00:00 +0000 (Mon, 01 Jan 2024) | 0 lines

------------------------------------------------------------------------
";
        let entries = parse_log(output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].author, "(no author)");
        assert!(entries[0].message.is_empty());
    }
}
