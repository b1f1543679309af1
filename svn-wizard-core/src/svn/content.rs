// file content retrieval - live working copy files or `svn cat` at a revision

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::io::ErrorKind;
use tracing::debug;

use super::{SvnClient, peg_safe};
use crate::error::{ProcessError, RetrievalError};
use crate::utils::decode_output;

lazy_static! {
    // svn error codes meaning "no such node"
    static ref NOT_FOUND_CODES: Regex =
        Regex::new(r"\b[EW](155010|160013|200009|195012|170000)\b").unwrap();
}

/// which version of a file to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevisionSelector {
    /// pristine copy the working file was checked out from
    Base,
    /// latest revision in the repository
    Head,
    Number(u64),
}

impl fmt::Display for RevisionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSelector::Base => write!(f, "BASE"),
            RevisionSelector::Head => write!(f, "HEAD"),
            RevisionSelector::Number(n) => write!(f, "{n}"),
        }
    }
}

/// anything that can hand out file content by path and revision
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// `None` reads the live working copy file
    async fn fetch(
        &self,
        path: &str,
        revision: Option<RevisionSelector>,
    ) -> Result<String, RetrievalError>;
}

#[async_trait]
impl ContentFetcher for SvnClient {
    async fn fetch(
        &self,
        path: &str,
        revision: Option<RevisionSelector>,
    ) -> Result<String, RetrievalError> {
        self.get_file_content(path, revision).await
    }
}

fn not_found(path: &str, revision: Option<RevisionSelector>) -> RetrievalError {
    RetrievalError::NotFound {
        path: path.to_string(),
        revision: match revision {
            Some(RevisionSelector::Number(n)) => Some(n),
            _ => None,
        },
    }
}

impl SvnClient {
    /// fetch `path` at `revision`, or from disk when no revision is given
    pub async fn get_file_content(
        &self,
        path: &str,
        revision: Option<RevisionSelector>,
    ) -> Result<String, RetrievalError> {
        let wc = match self.require_working_copy() {
            Ok(wc) => wc,
            Err(e) => {
                debug!(path, error = %e, "no working copy to read from");
                return Err(not_found(path, revision));
            }
        };

        let Some(revision) = revision else {
            let full = self.resolve(wc, path);
            return match tokio::fs::read(&full).await {
                Ok(bytes) => Ok(decode_output(&bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(path, None)),
                Err(e) => {
                    debug!(path, error = %e, "failed to read working copy file");
                    Err(not_found(path, None))
                }
            };
        };

        let args = vec![
            "cat".to_string(),
            "-r".to_string(),
            revision.to_string(),
            "--".to_string(),
            peg_safe(path),
        ];

        match self.run_svn(wc, args, Some(self.default_timeout())).await {
            Ok(output) => Ok(output.stdout),
            Err(ProcessError::NonZeroExit { ref stderr, .. }) if NOT_FOUND_CODES.is_match(stderr) => {
                debug!(path, %revision, "svn cat reported missing node");
                Err(not_found(path, Some(revision)))
            }
            Err(e) => Err(RetrievalError::Process(e)),
        }
    }

    /// content for a single-file comparison of `requested` against the working
    /// copy (when `current` is known) or against the previous revision
    pub async fn compare_revision(
        &self,
        path: &str,
        requested: u64,
        current: Option<u64>,
    ) -> Result<FileComparison, RetrievalError> {
        let sides = select_diff_sides(requested, current);
        let original = self.fetch_side(path, sides.original).await?;
        let modified = self.fetch_side(path, sides.modified).await?;

        Ok(FileComparison {
            path: path.to_string(),
            sides,
            original,
            modified,
        })
    }

    async fn fetch_side(&self, path: &str, side: ContentSide) -> Result<String, RetrievalError> {
        match side {
            ContentSide::WorkingCopy => self.get_file_content(path, None).await,
            // nothing exists before the first revision
            ContentSide::Revision(0) => Ok(String::new()),
            ContentSide::Revision(n) => {
                self.get_file_content(path, Some(RevisionSelector::Number(n)))
                    .await
            }
        }
    }
}

/// one pane of a side-by-side comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSide {
    WorkingCopy,
    Revision(u64),
}

impl fmt::Display for ContentSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSide::WorkingCopy => write!(f, "working copy"),
            ContentSide::Revision(n) => write!(f, "r{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffSides {
    pub original: ContentSide,
    pub modified: ContentSide,
}

/// content for both panes of a single-file comparison
#[derive(Debug, Clone)]
pub struct FileComparison {
    pub path: String,
    pub sides: DiffSides,
    pub original: String,
    pub modified: String,
}

impl FileComparison {
    /// unified diff of the two panes, labelled with the side each came from
    pub fn unified_diff(&self) -> String {
        super::diff::unified_block(
            &self.path,
            &self.original,
            &self.modified,
            &self.sides.original.to_string(),
            &self.sides.modified.to_string(),
        )
    }
}

/// decide which content goes in which pane when viewing `requested`.
///
/// with the working copy revision known, the requested revision is the
/// original and the live file the modified side, swapped when the working
/// copy is behind `requested` so the older content stays on the left.
/// without it, the revision is compared against its predecessor, which goes
/// on the left so the panes read old to new and show what `requested` changed.
pub fn select_diff_sides(requested: u64, current: Option<u64>) -> DiffSides {
    match current {
        Some(current) if current < requested => DiffSides {
            original: ContentSide::WorkingCopy,
            modified: ContentSide::Revision(requested),
        },
        Some(_) => DiffSides {
            original: ContentSide::Revision(requested),
            modified: ContentSide::WorkingCopy,
        },
        None => DiffSides {
            original: ContentSide::Revision(requested.saturating_sub(1)),
            modified: ContentSide::Revision(requested),
        },
    }
}
