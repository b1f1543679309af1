// svn-wizard-core/src/lib.rs

// declare modules
pub mod ai;
pub mod config;
pub mod error;
pub mod history;
pub mod process;
pub mod svn;
pub mod utils;

// re-export key structs/functions for external use by other crates
pub use anyhow::{Context, Result}; // re-export for convenience
pub use clap::Parser; // re-export Parser for CLI crate
pub use console::style;
pub use dialoguer::{MultiSelect, Select, theme::ColorfulTheme};
pub use dotenv::dotenv;
pub use indicatif::{ProgressBar, ProgressStyle};
pub use std::time::Duration;

pub use crate::ai::{OpenRouterSummarizer, Summarizer};
pub use crate::config::Config;
pub use crate::error::{ProcessError, RetrievalError, SvnError, SvnResult};
pub use crate::history::{HistoryRecord, HistoryStore, MAX_HISTORY};
pub use crate::svn::{
    ChangedFile, CommitOrchestrator, CommitResult, CommitState, CommitStatus, DiffPayload,
    FileStatus, Freshness, RevisionMonitor, RevisionState, SelectedFile, SvnClient,
};
pub use crate::utils::check_openrouter_api_key;

use crate::utils::truncate_with_ellipsis;

use std::path::PathBuf;

// argument parsing struct shared with the cli crate
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "svn-wizard-core")]
pub struct CoreCliArgs {
    /// path to the svn working copy (defaults to the configured one, then the current directory)
    #[arg(short, long)]
    pub path: Option<String>,

    /// svn executable to use
    #[arg(long)]
    pub svn: Option<String>,

    /// language the commit message is written in
    #[arg(short, long)]
    pub language: Option<String>,

    /// timeout in seconds for svn queries (commits never time out)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// show detailed diff information
    #[arg(short, long)]
    pub verbose: bool,

    /// commit all changed files with the generated message without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// print recent commit messages and exit
    #[arg(long)]
    pub history: bool,

    /// print working copy status and freshness and exit
    #[arg(short, long)]
    pub status: bool,

    /// compare a file with one of its recent revisions and exit
    #[arg(long, value_name = "PATH")]
    pub diff: Option<String>,
}

impl CoreCliArgs {
    /// layer command line flags over a loaded config
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(svn) = &self.svn {
            config.svn.binary = svn.clone();
        }
        if let Some(language) = &self.language {
            config.ai.language = language.clone();
        }
        if let Some(timeout) = self.timeout {
            config.svn.timeout_secs = timeout;
        }
        match &self.path {
            Some(path) => config.svn.working_copy_path = Some(PathBuf::from(path)),
            None if config.svn.working_copy_path.is_none() => {
                config.svn.working_copy_path =
                    Some(std::env::current_dir().context("failed to get current directory")?);
            }
            None => {}
        }
        config.detect_svn_root();
        Ok(())
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_revision_state(state: &RevisionState) {
    let revisions = match (state.local_revision, state.remote_revision) {
        (Some(local), Some(remote)) => format!("r{local} (HEAD r{remote})"),
        (Some(local), None) => format!("r{local} (HEAD unknown)"),
        _ => "unknown revision".to_string(),
    };
    let label = match state.classification {
        Freshness::UpToDate => style("up to date").green(),
        Freshness::Behind => style("behind").yellow().bold(),
        Freshness::Unknown => style("unknown").dim(),
    };
    println!("{} {revisions} - {label}", style("working copy:").cyan().bold());
}

fn print_changed_files(files: &[ChangedFile]) {
    println!("{}\n", style("changed files:").cyan().bold());
    for file in files {
        let line = format!("  {} {}", file.status_prefix(), file.path);
        let styled = match file.status {
            FileStatus::Added | FileStatus::Unversioned => style(line).green(),
            FileStatus::Deleted | FileStatus::Missing => style(line).red(),
            FileStatus::Conflicted | FileStatus::Obstructed => style(line).magenta(),
            _ => style(line).yellow(),
        };
        println!("{styled}");
    }
    println!();
}

async fn open_history(config: &Config) -> Result<HistoryStore> {
    let path = config.history.resolved_path()?;
    HistoryStore::open(path, config.history.max_records).await
}

async fn print_history(config: &Config) -> Result<()> {
    let store = open_history(config).await?;
    let records = store.list_newest_first().await;
    if records.is_empty() {
        println!("{}", style("no commit history yet").dim());
        return Ok(());
    }
    println!("{}\n", style("recent commit messages:").cyan().bold());
    for record in records {
        let when = record
            .created_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        let subject = record.message.lines().next().unwrap_or("");
        println!("  {} {}", style(when).dim(), subject);
    }
    Ok(())
}

/// pick a revision of `path` from its recent log and print it against the
/// working copy
async fn show_revision_diff(
    client: &SvnClient,
    path: &str,
    state: &RevisionState,
    latest: bool,
) -> Result<()> {
    let entries = client
        .log(path, 10)
        .await
        .with_context(|| format!("failed to read the log of {path}"))?;
    if entries.is_empty() {
        println!("{}", style(format!("no history for {path}")).dim());
        return Ok(());
    }

    let entry = if latest {
        &entries[0]
    } else {
        let items: Vec<String> = entries
            .iter()
            .map(|e| {
                let subject = e.message.lines().next().unwrap_or("");
                format!("r{} {} {}", e.revision, e.author, truncate_with_ellipsis(subject, 60))
            })
            .collect();
        let pick = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("compare {path} with which revision?"))
            .default(0)
            .items(&items[..])
            .interact()?;
        &entries[pick]
    };

    let comparison = client
        .compare_revision(path, entry.revision, state.local_revision)
        .await?;
    println!(
        "{} {} vs {}\n",
        style(path).cyan().bold(),
        comparison.sides.original,
        comparison.sides.modified
    );
    if comparison.original == comparison.modified {
        println!("{}", style("no differences").dim());
    } else {
        println!("{}", comparison.unified_diff());
    }
    Ok(())
}

async fn generate_message(
    summarizer: &OpenRouterSummarizer,
    payload: &DiffPayload,
    language: &str,
) -> Result<String> {
    let progress = spinner(&format!(
        "🧙 generating commit message with {}...",
        summarizer.model()
    ));
    let result = summarizer.summarize_payload(payload, language).await;
    progress.finish_and_clear();
    result.context("failed to generate commit message")
}

// the svn review and commit flow: status, select, diff, summarise, confirm, commit
pub async fn execute_svn_wizard_flow(args: CoreCliArgs) -> Result<(String, bool)> {
    dotenv().ok();

    let mut config = Config::load().context("failed to load configuration")?;
    args.apply_to(&mut config)?;

    if args.history {
        print_history(&config).await?;
        return Ok((String::new(), false));
    }

    println!("{}", style("\nsvn-wizard 🧙").cyan().bold());
    println!("{}\n", style("ai-assisted subversion commits").dim());

    let client = SvnClient::new(config.clone());
    client
        .require_working_copy()
        .context("svn is not set up; pass --path or set SVN_WIZARD_ROOT")?;

    // polls HEAD in the background until the monitor drops
    let mut monitor = RevisionMonitor::new(client.clone());
    let state = monitor.start().await;
    print_revision_state(&state);

    if let Some(path) = &args.diff {
        show_revision_diff(&client, path, &state, args.yes).await?;
        return Ok((String::new(), false));
    }

    let progress = spinner("reading working copy status...");
    let changed = client.get_changed_files().await;
    progress.finish_and_clear();
    let changed = changed.context("failed to read working copy status")?;

    if args.status {
        if changed.is_empty() {
            println!("{}", style("no local changes").dim());
        } else {
            print_changed_files(&changed);
        }
        return Ok((String::new(), false));
    }

    if state.is_behind() && !args.yes {
        let update = dialoguer::Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("working copy is behind HEAD. run svn update first?")
            .default(true)
            .interact()?;
        if update {
            let progress = spinner("updating working copy...");
            let result = client.update().await;
            progress.finish_and_clear();
            match result {
                Ok(Some(revision)) => {
                    println!("{}", style(format!("updated to revision {revision}")).green())
                }
                Ok(None) => println!("{}", style("update finished").green()),
                Err(e) => eprintln!("{} {}", style("⚠️  update failed:").yellow().bold(), e),
            }
            monitor.refresh().await;
        }
    }

    if changed.is_empty() {
        return Err(anyhow::anyhow!("no changes detected in the working copy"));
    }

    let reviewed_head = monitor.current().remote_revision;

    check_openrouter_api_key()?;

    print_changed_files(&changed);

    let selected: Vec<SelectedFile> = if args.yes {
        changed.iter().map(SelectedFile::from).collect()
    } else {
        let items: Vec<String> = changed
            .iter()
            .map(|f| format!("{} {}", f.status.label(), f.path))
            .collect();
        let defaults: Vec<bool> = changed
            .iter()
            .map(|f| f.status != FileStatus::Unversioned)
            .collect();
        let picks = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt("select files to commit (space to toggle)")
            .items(&items[..])
            .defaults(&defaults[..])
            .interact()?;
        picks.into_iter().map(|i| SelectedFile::from(&changed[i])).collect()
    };

    if selected.is_empty() {
        return Err(anyhow::anyhow!("no files selected"));
    }

    let progress = spinner("assembling diff...");
    let payload = client.get_diff(&selected).await;
    progress.finish_and_clear();

    if args.verbose {
        println!("{} {}", style("diff:").cyan().bold(), payload.summary());
        println!("{}\n", style(&payload.diff_content).dim());
    }

    let summarizer = OpenRouterSummarizer::from_env(&config.ai)?;
    let language = config.ai.language.clone();

    let mut commit_message = generate_message(&summarizer, &payload, &language).await?;

    println!("\n{}\n", style("✅ generated commit message:").green().bold());
    println!("{}", style(&commit_message).yellow());
    println!();

    if !args.yes {
        println!("{}", style("press ctrl+c at any time to exit").dim());

        loop {
            let options = &[
                "yes, commit this message",
                "edit this message",
                "no, regenerate message",
                "cancel",
            ];
            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("what would you like to do?")
                .default(0)
                .items(options)
                .interact()?;

            match selection {
                0 => break,
                1 => {
                    if let Some(edited) = open_editor_for_message(&commit_message)? {
                        commit_message = edited;
                        println!("{}", style("commit message updated").green());
                    } else {
                        println!("{}", style("edit cancelled, using previous message").yellow());
                    }
                    println!("\n{}", style("current commit message:").cyan().bold());
                    println!("{}", style(&commit_message).yellow());
                    println!();
                }
                2 => {
                    println!("\n{}", style("regenerating...").cyan());
                    commit_message = generate_message(&summarizer, &payload, &language).await?;
                    println!("\n{}\n", style("✅ newly generated commit message:").green().bold());
                    println!("{}", style(&commit_message).yellow());
                    println!();
                }
                _ => return Ok((commit_message, false)),
            }
        }
    } else {
        println!(
            "{}",
            style("--yes flag detected, committing with the generated message.").green()
        );
    }

    if let Err(e) = ai::validate_commit_message(&commit_message) {
        eprintln!("{} {}", style("⚠️").yellow(), style(e).yellow());
    }

    let latest = monitor.current();
    if latest.is_behind() && latest.remote_revision > reviewed_head {
        let head = latest.remote_revision.unwrap_or_default();
        eprintln!(
            "{} {}",
            style("⚠️").yellow(),
            style(format!("HEAD moved to r{head} while reviewing; the commit may be out of date")).yellow()
        );
    }

    let mut orchestrator = CommitOrchestrator::new(client.clone());
    let progress = spinner("committing...");
    let result = orchestrator.commit(&commit_message, &selected).await;
    progress.finish_and_clear();

    if !result.is_success() {
        return Err(SvnError::Commit(result.message).into());
    }

    println!("{}", style(format!("\n✅ {}", result.message)).green().bold());

    match open_history(&config).await {
        Ok(store) => {
            if let Err(e) = store.add(commit_message.clone()).await {
                tracing::warn!(error = %e, "failed to record commit message");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to open commit history"),
    }

    // refresh so the caller sees the post-commit state
    orchestrator.reset();
    let remaining = client.get_changed_files().await.unwrap_or_default();
    let state = monitor.refresh().await;
    print_revision_state(&state);
    if !remaining.is_empty() {
        println!(
            "{}",
            style(format!("{} file(s) still have local changes", remaining.len())).dim()
        );
    }

    Ok((commit_message, true))
}

// helper function for editing the message
fn open_editor_for_message(current_message: &str) -> Result<Option<String>> {
    use crossterm::terminal::disable_raw_mode;
    use std::{
        env,
        fs::{self, File},
        io::Write,
        process::{Command, Stdio},
    };
    use which::which;

    let millis = chrono::Utc::now().timestamp_millis();
    let tmp_path = env::temp_dir().join(format!("svn-wizard-{millis}.txt"));

    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(current_message.as_bytes())
            .context("failed to write initial commit message")?;
    }

    let _ = disable_raw_mode();

    let editor = if let Ok(vis) = env::var("VISUAL") {
        vis
    } else if let Ok(ed) = env::var("EDITOR") {
        ed
    } else {
        // fallback to first available editor
        let candidates = ["code -w", "nvim", "vim", "vi", "nano"];
        candidates
            .iter()
            .find(|cand| {
                cand.split_whitespace()
                    .next()
                    .is_some_and(|exe| which(exe).is_ok())
            })
            .map(|s| s.to_string())
            .unwrap_or_else(|| "nano".to_string())
    };

    // "code -w" style editors carry their own arguments
    let mut editor_parts = editor.split_whitespace();
    let editor_executable = editor_parts.next().unwrap_or(&editor);
    let editor_args = editor_parts.collect::<Vec<&str>>();

    let status = Command::new(editor_executable)
        .args(&editor_args)
        .arg(&tmp_path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to execute editor '{editor}'"))?;

    if !status.success() {
        eprintln!(
            "{}",
            style(format!("editor '{editor}' exited with error: {status}")).yellow()
        );
        let _ = fs::remove_file(&tmp_path);
        return Ok(None);
    }

    let edited = fs::read_to_string(&tmp_path)
        .with_context(|| format!("failed to read {}", tmp_path.display()))?;
    let _ = fs::remove_file(&tmp_path);

    if edited.trim_end() != current_message.trim_end() && !edited.trim().is_empty() {
        Ok(Some(edited.trim_end().to_string()))
    } else {
        println!("{}", style("no changes detected; using previous message").yellow());
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config() {
        let args = CoreCliArgs::parse_from([
            "svn-wizard",
            "--path",
            "/work/trunk",
            "--language",
            "French",
            "--timeout",
            "7",
            "--svn",
            "/opt/svn/bin/svn",
        ]);
        let mut config = Config::default();
        config.svn.root_path = Some(PathBuf::from("/opt/svn"));
        args.apply_to(&mut config).unwrap();

        assert_eq!(config.svn.working_copy_path, Some(PathBuf::from("/work/trunk")));
        assert_eq!(config.ai.language, "French");
        assert_eq!(config.svn.timeout_secs, 7);
        assert_eq!(config.svn.binary, "/opt/svn/bin/svn");
        assert_eq!(config.svn.root_path, Some(PathBuf::from("/opt/svn")));
    }

    #[test]
    fn configured_working_copy_survives_without_path_flag() {
        let args = CoreCliArgs::parse_from(["svn-wizard", "--yes"]);
        let mut config = Config::default();
        config.svn.working_copy_path = Some(PathBuf::from("/work/branch"));
        args.apply_to(&mut config).unwrap();

        assert!(args.yes);
        assert_eq!(config.svn.working_copy_path, Some(PathBuf::from("/work/branch")));
    }

    #[test]
    fn diff_flag_takes_a_path() {
        let args = CoreCliArgs::parse_from(["svn-wizard", "--diff", "src/main.rs"]);
        assert_eq!(args.diff.as_deref(), Some("src/main.rs"));
        assert!(CoreCliArgs::parse_from(["svn-wizard"]).diff.is_none());
    }
}
