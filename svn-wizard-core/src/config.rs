// configuration - toml file, then environment, then command line flags

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::history::MAX_HISTORY;

pub const DEFAULT_EXCLUSION_MARKER: &str = "ignore-on-commit";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1:free";
pub const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub svn: SvnConfig,
    pub history: HistoryConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SvnConfig {
    /// svn executable, either a bare name looked up on PATH or a full path
    pub binary: String,
    /// root of the svn installation or repository checkout the tool works against
    pub root_path: Option<PathBuf>,
    /// working copy whose changes are reviewed and committed
    pub working_copy_path: Option<PathBuf>,
    pub timeout_secs: u64,
    /// status lines whose path contains this marker end the status scan
    pub exclusion_marker: String,
    pub poll_interval_secs: u64,
}

impl Default for SvnConfig {
    fn default() -> Self {
        Self {
            binary: "svn".to_string(),
            root_path: None,
            working_copy_path: None,
            timeout_secs: 30,
            exclusion_marker: DEFAULT_EXCLUSION_MARKER.to_string(),
            poll_interval_secs: 300,
        }
    }
}

impl SvnConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: Option<PathBuf>,
    pub max_records: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_records: MAX_HISTORY,
        }
    }
}

impl HistoryConfig {
    /// configured history file, or `history.json` next to the config file
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("history.json")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    /// language the generated commit message is written in
    pub language: String,
    pub endpoint: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            language: "English".to_string(),
            endpoint: OPENROUTER_ENDPOINT.to_string(),
        }
    }
}

/// directory holding config.toml and the default history file
pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("failed to get config directory")?
        .join("svn-wizard"))
}

impl Config {
    /// load `~/.config/svn-wizard/config.toml` if present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join("config.toml");
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents).context("failed to write config")?;
        Ok(())
    }

    /// default the svn root to the directory holding the svn executable on PATH
    pub fn detect_svn_root(&mut self) -> Option<&Path> {
        if self.svn.root_path.is_none() {
            if let Ok(found) = which::which(&self.svn.binary) {
                self.svn.root_path = found.parent().map(Path::to_path_buf);
            }
        }
        self.svn.root_path.as_deref()
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// apply overrides from a key lookup (the process environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(binary) = non_empty("SVN_WIZARD_SVN") {
            self.svn.binary = binary;
        }
        if let Some(root) = non_empty("SVN_WIZARD_ROOT") {
            self.svn.root_path = Some(PathBuf::from(root));
        }
        if let Some(wc) = non_empty("SVN_WIZARD_WORKING_COPY") {
            self.svn.working_copy_path = Some(PathBuf::from(wc));
        }
        if let Some(model) = non_empty("OPENROUTER_MODEL") {
            self.ai.model = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.svn.binary, "svn");
        assert_eq!(config.svn.exclusion_marker, "ignore-on-commit");
        assert_eq!(config.history.max_records, 50);
        assert!(config.svn.working_copy_path.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [svn]
            working_copy_path = "/work/trunk"
            timeout_secs = 5

            [ai]
            language = "German"
            "#,
        )
        .unwrap();

        assert_eq!(config.svn.working_copy_path, Some(PathBuf::from("/work/trunk")));
        assert_eq!(config.svn.timeout(), Duration::from_secs(5));
        assert_eq!(config.svn.binary, "svn");
        assert_eq!(config.ai.language, "German");
        assert_eq!(config.ai.model, DEFAULT_MODEL);
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut config = Config::from_toml("[svn]\nbinary = \"/opt/svn/bin/svn\"\n").unwrap();
        let vars: HashMap<&str, &str> = [
            ("SVN_WIZARD_WORKING_COPY", "/work/branch"),
            ("SVN_WIZARD_SVN", ""),
            ("OPENROUTER_MODEL", "openai/gpt-4o-mini"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        // empty values are ignored
        assert_eq!(config.svn.binary, "/opt/svn/bin/svn");
        assert_eq!(config.svn.working_copy_path, Some(PathBuf::from("/work/branch")));
        assert_eq!(config.ai.model, "openai/gpt-4o-mini");
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.svn.root_path = Some(PathBuf::from("/srv/svn"));
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.svn.root_path, Some(PathBuf::from("/srv/svn")));
    }

    #[test]
    fn configured_svn_root_is_kept() {
        let mut config = Config::default();
        config.svn.root_path = Some(PathBuf::from("/opt/svn"));
        config.svn.binary = "definitely-not-an-svn-binary".to_string();
        assert_eq!(config.detect_svn_root(), Some(Path::new("/opt/svn")));

        config.svn.root_path = None;
        assert_eq!(config.detect_svn_root(), None);
    }
}
