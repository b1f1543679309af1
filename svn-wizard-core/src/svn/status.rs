// parsing of `svn status` output
//
// every line starts with seven fixed status columns followed by a separator
// and the path from byte offset 8:
//
//   M       src/a.rs
//   ?       notes.txt
//   A  +    src/copied.rs

use serde::{Deserialize, Serialize};
use tracing::debug;

/// number of fixed-width flag columns at the start of a status line
pub const FLAG_COLUMNS: usize = 7;
/// position where the path starts
pub const PATH_OFFSET: usize = 8;

/// primary item state (column 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Normal,
    Added,
    Conflicted,
    Deleted,
    Ignored,
    Modified,
    Replaced,
    External,
    Unversioned,
    Missing,
    Obstructed,
    Unknown(char),
}

impl FileStatus {
    pub fn from_code(code: char) -> Self {
        match code {
            ' ' => FileStatus::Normal,
            'A' => FileStatus::Added,
            'C' => FileStatus::Conflicted,
            'D' => FileStatus::Deleted,
            'I' => FileStatus::Ignored,
            'M' => FileStatus::Modified,
            'R' => FileStatus::Replaced,
            'X' => FileStatus::External,
            '?' => FileStatus::Unversioned,
            '!' => FileStatus::Missing,
            '~' => FileStatus::Obstructed,
            other => FileStatus::Unknown(other),
        }
    }

    pub fn code(self) -> char {
        match self {
            FileStatus::Normal => ' ',
            FileStatus::Added => 'A',
            FileStatus::Conflicted => 'C',
            FileStatus::Deleted => 'D',
            FileStatus::Ignored => 'I',
            FileStatus::Modified => 'M',
            FileStatus::Replaced => 'R',
            FileStatus::External => 'X',
            FileStatus::Unversioned => '?',
            FileStatus::Missing => '!',
            FileStatus::Obstructed => '~',
            FileStatus::Unknown(c) => c,
        }
    }

    /// the file disappears with the commit
    pub fn is_deletion(self) -> bool {
        matches!(self, FileStatus::Deleted | FileStatus::Missing)
    }

    /// the file has no base revision to diff against
    pub fn is_addition(self) -> bool {
        matches!(self, FileStatus::Added | FileStatus::Unversioned)
    }

    pub fn label(self) -> &'static str {
        match self {
            FileStatus::Normal => "normal",
            FileStatus::Added => "added",
            FileStatus::Conflicted => "conflicted",
            FileStatus::Deleted => "deleted",
            FileStatus::Ignored => "ignored",
            FileStatus::Modified => "modified",
            FileStatus::Replaced => "replaced",
            FileStatus::External => "external",
            FileStatus::Unversioned => "unversioned",
            FileStatus::Missing => "missing",
            FileStatus::Obstructed => "obstructed",
            FileStatus::Unknown(_) => "unknown",
        }
    }
}

/// one parsed status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub status: FileStatus,
    pub property_status: Option<char>,
    pub lock_status: Option<char>,
    pub history_status: Option<char>,
    pub switched_status: Option<char>,
    pub lock_token: Option<char>,
    pub tree_conflict_status: Option<char>,
    pub path: String,
}

impl ChangedFile {
    /// rebuild the seven flag columns this record was parsed from
    pub fn status_prefix(&self) -> String {
        let flag = |c: Option<char>| c.unwrap_or(' ');
        [
            self.status.code(),
            flag(self.property_status),
            flag(self.lock_status),
            flag(self.history_status),
            flag(self.switched_status),
            flag(self.lock_token),
            flag(self.tree_conflict_status),
        ]
        .iter()
        .collect()
    }
}

fn optional_flag(c: char) -> Option<char> {
    if c == ' ' { None } else { Some(c) }
}

/// prefixes of the banner and summary lines svn mixes into status output
const NON_ENTRY_PREFIXES: [&str; 4] = [
    "---",
    "Performing status on external item",
    "Summary of conflicts:",
    "Status against revision:",
];

/// whether `line` describes a file rather than a header, banner or summary.
///
/// entries leave the character before the path blank; tree-conflict detail
/// lines are six blanks and a `>`.
pub fn is_status_entry(line: &str) -> bool {
    if NON_ENTRY_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return false;
    }
    let head: Vec<char> = line.chars().take(PATH_OFFSET).collect();
    if head.len() >= FLAG_COLUMNS
        && head[FLAG_COLUMNS - 1] == '>'
        && head[..FLAG_COLUMNS - 1].iter().all(|c| *c == ' ')
    {
        return false;
    }
    // "  Tree conflicts: 1" and friends
    head.get(PATH_OFFSET - 1).is_none_or(|c| *c == ' ')
}

/// parse a single status line. short lines are padded with blanks rather
/// than rejected; a line whose path comes out empty, or that is not a file
/// entry at all, yields `None`.
pub fn parse_status_line(line: &str) -> Option<ChangedFile> {
    if !is_status_entry(line) {
        debug!(line, "not a status entry");
        return None;
    }

    let mut flags = [' '; FLAG_COLUMNS];
    for (slot, c) in flags.iter_mut().zip(line.chars()) {
        *slot = c;
    }

    let path: String = line.chars().skip(PATH_OFFSET).collect();
    let path = path.trim();
    if path.is_empty() {
        debug!(line, "status line without a path");
        return None;
    }

    Some(ChangedFile {
        status: FileStatus::from_code(flags[0]),
        property_status: optional_flag(flags[1]),
        lock_status: optional_flag(flags[2]),
        history_status: optional_flag(flags[3]),
        switched_status: optional_flag(flags[4]),
        lock_token: optional_flag(flags[5]),
        tree_conflict_status: optional_flag(flags[6]),
        path: path.to_string(),
    })
}

/// parse full `svn status` output.
///
/// scanning stops at the first changelist header or entry path containing
/// `exclusion_marker`; that line and everything after it are dropped. svn
/// prints changelists after the plain entries, so this cuts off the
/// `ignore-on-commit` list. other headers, banners and summaries are skipped.
pub fn parse_status(output: &str, exclusion_marker: &str) -> Vec<ChangedFile> {
    let mut files = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !exclusion_marker.is_empty()
            && line.starts_with("--- ")
            && line.contains(exclusion_marker)
        {
            debug!(line, "exclusion changelist reached, ignoring remaining status");
            break;
        }

        let Some(file) = parse_status_line(line) else {
            continue;
        };

        if !exclusion_marker.is_empty() && file.path.contains(exclusion_marker) {
            debug!(path = %file.path, "exclusion marker reached, ignoring remaining status");
            break;
        }

        files.push(file);
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "ignore-on-commit";

    #[test]
    fn parses_the_documented_example() {
        let output = "M       src/a.ts\nA       src/b.ts\n?       src/ignore-on-commit/tmp.log\nD       src/c.ts\n";
        let files = parse_status(output, MARKER);

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/a.ts");
        assert_eq!(files[0].status, FileStatus::Modified);
        assert_eq!(files[1].path, "src/b.ts");
        assert_eq!(files[1].status, FileStatus::Added);
        assert!(files.iter().all(|f| f.path != "src/c.ts"));
    }

    #[test]
    fn changelist_header_ends_the_scan() {
        let output = "M       keep.rs\n\n--- Changelist 'ignore-on-commit':\nM       local.cfg\n";
        let files = parse_status(output, MARKER);
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["keep.rs"]);
    }

    #[test]
    fn lines_before_the_marker_keep_their_order() {
        let output = "?       z.txt\nM       a.txt\nD       m.txt\nM       x/ignore-on-commit\nM       after.txt\n";
        let paths: Vec<String> = parse_status(output, MARKER)
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["z.txt", "a.txt", "m.txt"]);
    }

    #[test]
    fn empty_marker_never_stops_the_scan() {
        let output = "M       a\nM       b\n";
        assert_eq!(parse_status(output, "").len(), 2);
    }

    #[test]
    fn reads_all_seven_flag_columns() {
        let file = parse_status_line("MMKHSOC path/with spaces.txt").unwrap();
        assert_eq!(file.status, FileStatus::Modified);
        assert_eq!(file.property_status, Some('M'));
        assert_eq!(file.lock_status, Some('K'));
        assert_eq!(file.history_status, Some('H'));
        assert_eq!(file.switched_status, Some('S'));
        assert_eq!(file.lock_token, Some('O'));
        assert_eq!(file.tree_conflict_status, Some('C'));
        assert_eq!(file.path, "path/with spaces.txt");
    }

    #[test]
    fn flag_prefix_round_trips() {
        let lines = [
            "M       src/a.rs",
            "A  +    src/copied.rs",
            " M      props-only.rs",
            "?       new.txt",
            "!     C missing.rs",
            "R    S  switched.rs",
        ];
        for line in lines {
            let file = parse_status_line(line).unwrap();
            assert_eq!(file.status_prefix(), &line[..FLAG_COLUMNS], "line: {line:?}");
        }
    }

    #[test]
    fn short_lines_do_not_fail() {
        assert!(parse_status_line("M").is_none());
        assert!(parse_status_line("M      x").is_none());
        assert!(parse_status_line("M       ").is_none());
        let file = parse_status_line("M       y").unwrap();
        assert_eq!(file.path, "y");
        assert_eq!(file.status_prefix(), "M      ");
    }

    #[test]
    fn banners_and_summaries_are_not_files() {
        let output = "M       src/a.rs
      C src/b.rs
      >   local file edit, incoming file delete or move upon update

Performing status on external item at 'vendor/lib':
M       vendor/lib/x.c

--- Changelist 'feature':
M       src/c.rs
Summary of conflicts:
  Tree conflicts: 1
";
        let files = parse_status(output, MARKER);
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.rs", "src/b.rs", "vendor/lib/x.c", "src/c.rs"]);
        assert_eq!(files[1].status, FileStatus::Normal);
        assert_eq!(files[1].tree_conflict_status, Some('C'));
    }

    #[test]
    fn marker_changelist_after_other_changelists_still_stops() {
        let output = "--- Changelist 'feature':\nM       src/c.rs\n\n--- Changelist 'ignore-on-commit':\nM       local.cfg\n";
        let paths: Vec<String> = parse_status(output, MARKER)
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["src/c.rs"]);
    }

    #[test]
    fn entry_detection() {
        assert!(is_status_entry("M       a.rs"));
        assert!(is_status_entry("  L     locked.rs"));
        assert!(!is_status_entry("  Text conflicts: 2"));
        assert!(!is_status_entry("Status against revision:   1204"));
        assert!(!is_status_entry("      >   moved away"));
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let file = parse_status_line("Z       odd.txt").unwrap();
        assert_eq!(file.status, FileStatus::Unknown('Z'));
        assert_eq!(file.status_prefix().chars().next(), Some('Z'));
    }
}
