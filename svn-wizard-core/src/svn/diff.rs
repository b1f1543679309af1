// diff assembly - turns a file selection into the text handed to the summarizer

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use super::content::{ContentFetcher, RevisionSelector};
use super::status::{ChangedFile, FileStatus};
use super::SvnClient;
use crate::utils::{is_binary_path, looks_binary};

/// diff content used when the selection produced no textual change
pub const NO_MODIFICATIONS: &str = "No modifications found.";

const SEPARATOR: &str =
    "===================================================================";

/// a file picked for review or commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub path: String,
    pub status: FileStatus,
}

impl SelectedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

impl From<&ChangedFile> for SelectedFile {
    fn from(file: &ChangedFile) -> Self {
        Self::new(file.path.clone(), file.status)
    }
}

/// everything the summarizer gets to see about a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPayload {
    pub diff_content: String,
    pub added_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub deleted_files: Vec<String>,
}

impl DiffPayload {
    pub fn empty() -> Self {
        Self {
            diff_content: NO_MODIFICATIONS.to_string(),
            added_files: Vec::new(),
            modified_files: Vec::new(),
            deleted_files: Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.diff_content != NO_MODIFICATIONS
    }

    pub fn file_count(&self) -> usize {
        self.added_files.len() + self.modified_files.len() + self.deleted_files.len()
    }

    /// one-line overview, e.g. "2 modified, 1 added, 0 deleted"
    pub fn summary(&self) -> String {
        format!(
            "{} modified, {} added, {} deleted",
            self.modified_files.len(),
            self.added_files.len(),
            self.deleted_files.len()
        )
    }
}

impl SvnClient {
    /// assemble the diff for `selected`; incomplete configuration gives the empty payload
    pub async fn get_diff(&self, selected: &[SelectedFile]) -> DiffPayload {
        match self.working_copy() {
            Ok(Some(_)) => assemble_diff(self, selected).await,
            Ok(None) => DiffPayload::empty(),
            Err(e) => {
                warn!(error = %e, "cannot assemble diff");
                DiffPayload::empty()
            }
        }
    }
}

pub(crate) fn unified_block(path: &str, old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let body = diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("{path}\t({old_label})"), &format!("{path}\t({new_label})"))
        .to_string();
    format!("Index: {path}\n{SEPARATOR}\n{body}")
}

fn note_block(path: &str, note: &str) -> String {
    format!("Index: {path}\n{SEPARATOR}\n{note}\n")
}

/// build a `DiffPayload` for `selected`, in input order.
///
/// deletions are listed without fetching anything, additions only fetch the
/// new content, everything else fetches BASE and the working file. a file
/// whose content cannot be fetched gets an inline note and the batch carries on.
pub async fn assemble_diff<F>(fetcher: &F, selected: &[SelectedFile]) -> DiffPayload
where
    F: ContentFetcher + ?Sized,
{
    let mut payload = DiffPayload::empty();
    let mut blocks: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    for file in selected {
        // a path lands in exactly one list
        if !seen.insert(file.path.as_str()) {
            debug!(path = %file.path, "duplicate selection ignored");
            continue;
        }

        if file.status.is_deletion() {
            payload.deleted_files.push(file.path.clone());
            continue;
        }

        let is_new = file.status.is_addition();
        if is_new {
            payload.added_files.push(file.path.clone());
        } else {
            payload.modified_files.push(file.path.clone());
        }

        if is_binary_path(Path::new(&file.path)) {
            blocks.push(note_block(
                &file.path,
                "Cannot display: file marked as a binary type.",
            ));
            continue;
        }

        let new = match fetcher.fetch(&file.path, None).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %file.path, error = %e, "failed to read working copy file");
                blocks.push(note_block(&file.path, &format!("(content unavailable: {e})")));
                continue;
            }
        };

        let old = if is_new {
            String::new()
        } else {
            match fetcher.fetch(&file.path, Some(RevisionSelector::Base)).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %file.path, error = %e, "failed to fetch base revision");
                    blocks.push(note_block(
                        &file.path,
                        &format!("(base revision unavailable: {e})"),
                    ));
                    continue;
                }
            }
        };

        if looks_binary(&old) || looks_binary(&new) {
            blocks.push(note_block(
                &file.path,
                "Cannot display: file marked as a binary type.",
            ));
            continue;
        }

        if old == new {
            // property-only changes have no text to show
            continue;
        }

        let old_label = if is_new { "nonexistent" } else { "BASE" };
        blocks.push(unified_block(&file.path, &old, &new, old_label, "working copy"));
    }

    if !blocks.is_empty() {
        payload.diff_content = blocks.join("\n");
    }

    payload
}
