// svn integration - everything that talks to the svn executable goes through SvnClient

pub mod commit;
pub mod content;
pub mod diff;
pub mod log;
pub mod revision;
pub mod status;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::error::{ProcessError, SvnError, SvnResult};
use crate::process::{self, ProcessOutput};

pub use commit::{CommitOrchestrator, CommitResult, CommitState, CommitStatus};
pub use content::{ContentFetcher, ContentSide, DiffSides, FileComparison, RevisionSelector, select_diff_sides};
pub use diff::{DiffPayload, NO_MODIFICATIONS, SelectedFile, assemble_diff};
pub use log::LogEntry;
pub use revision::{Freshness, InfoRecord, RevisionMonitor, RevisionState, classify};
pub use status::{ChangedFile, FileStatus};

/// shared handle to the configured svn working copy.
///
/// cloning is cheap; all clones read the same configuration.
#[derive(Debug, Clone)]
pub struct SvnClient {
    config: Arc<Config>,
}

impl SvnClient {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_shared(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// svn executable to run: an absolute binary as-is, otherwise looked up
    /// under the configured root (`<root>/bin/<binary>`, `<root>/<binary>`)
    /// before falling back to PATH
    pub fn program(&self) -> PathBuf {
        let binary = Path::new(&self.config.svn.binary);
        if binary.is_absolute() {
            return binary.to_path_buf();
        }
        if let Some(root) = &self.config.svn.root_path {
            for candidate in [root.join("bin").join(binary), root.join(binary)] {
                if candidate.is_file() {
                    return candidate;
                }
            }
        }
        binary.to_path_buf()
    }

    /// the working copy, once both the svn root and the working copy are configured.
    ///
    /// `Ok(None)` means configuration is incomplete and the caller should
    /// treat the operation as a no-op. a configured root that does not exist
    /// on disk is a misconfiguration and reported as `PathNotFound`.
    pub fn working_copy(&self) -> SvnResult<Option<&Path>> {
        let svn = &self.config.svn;
        let (Some(root), Some(wc)) = (&svn.root_path, &svn.working_copy_path) else {
            return Ok(None);
        };
        if !root.exists() {
            return Err(SvnError::PathNotFound(root.clone()));
        }
        Ok(Some(wc.as_path()))
    }

    /// like `working_copy` but treats missing configuration as an error
    pub fn require_working_copy(&self) -> SvnResult<&Path> {
        match self.working_copy()? {
            Some(wc) => Ok(wc),
            None if self.config.svn.root_path.is_none() => Err(SvnError::ConfigMissing("svn root path")),
            None => Err(SvnError::ConfigMissing("working copy path")),
        }
    }

    /// resolve a status path against the working copy
    pub fn resolve(&self, wc: &Path, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            wc.join(candidate)
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.config.svn.timeout()
    }

    /// run an svn subcommand inside the working copy, always non-interactively
    pub(crate) async fn run_svn<I, S>(
        &self,
        wc: &Path,
        args: I,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv: Vec<OsString> = args.into_iter().map(Into::into).collect();
        // global option placed after the subcommand, which svn accepts
        argv.insert(1.min(argv.len()), OsString::from("--non-interactive"));

        let program = self.program();
        process::run(&program.to_string_lossy(), argv, wc, timeout).await
    }

    /// `svn status` for the working copy.
    ///
    /// incomplete configuration or a failing svn invocation yield an empty
    /// list; only a configured root that is missing on disk is an error.
    pub async fn get_changed_files(&self) -> SvnResult<Vec<ChangedFile>> {
        let Some(wc) = self.working_copy()? else {
            return Ok(Vec::new());
        };

        match self.run_svn(wc, ["status"], Some(self.default_timeout())).await {
            Ok(output) => Ok(status::parse_status(
                &output.stdout,
                &self.config.svn.exclusion_marker,
            )),
            Err(e) => {
                warn!(error = %e, working_copy = %wc.display(), "svn status failed");
                Ok(Vec::new())
            }
        }
    }
}

/// svn treats a trailing `@rev` as a peg revision; paths that contain `@`
/// need an explicit empty peg
pub(crate) fn peg_safe(path: &str) -> String {
    if path.contains('@') {
        format!("{path}@")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SvnConfig;

    fn client_with(root: Option<PathBuf>, wc: Option<PathBuf>) -> SvnClient {
        let mut config = Config::default();
        config.svn = SvnConfig {
            root_path: root,
            working_copy_path: wc,
            ..SvnConfig::default()
        };
        SvnClient::new(config)
    }

    #[test]
    fn incomplete_config_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert!(client_with(None, Some(dir.path().to_path_buf())).working_copy().unwrap().is_none());
        assert!(client_with(Some(dir.path().to_path_buf()), None).working_copy().unwrap().is_none());
    }

    #[test]
    fn missing_root_on_disk_is_an_error() {
        let client = client_with(
            Some(PathBuf::from("/definitely/not/here/svn-root")),
            Some(PathBuf::from("/tmp")),
        );
        assert!(matches!(client.working_copy(), Err(SvnError::PathNotFound(_))));
    }

    #[test]
    fn require_working_copy_names_the_missing_setting() {
        let err = client_with(None, None).require_working_copy().unwrap_err();
        assert!(matches!(err, SvnError::ConfigMissing("svn root path")));
    }

    #[test]
    fn program_prefers_the_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin").join("svn"), "").unwrap();
        let client = client_with(Some(dir.path().to_path_buf()), None);
        assert_eq!(client.program(), dir.path().join("bin").join("svn"));

        let fallback = client_with(None, None);
        assert_eq!(fallback.program(), PathBuf::from("svn"));
    }

    #[test]
    fn peg_revision_escaping() {
        assert_eq!(peg_safe("img/logo@2x.png"), "img/logo@2x.png@");
        assert_eq!(peg_safe("src/main.rs"), "src/main.rs");
    }

    #[tokio::test]
    async fn changed_files_empty_without_config() {
        let files = client_with(None, None).get_changed_files().await.unwrap();
        assert!(files.is_empty());
    }
}
