// prompt construction module - builds prompts for ai interaction

use crate::svn::{DiffPayload, NO_MODIFICATIONS};
use crate::utils::truncate_with_ellipsis;

/// upper bound on diff text sent to the model
const MAX_DIFF_CHARS: usize = 12_000;

/// system prompt for commit summaries
pub fn get_system_prompt(language: &str) -> String {
    format!(
        "you are a developer writing concise subversion commit messages. \
         summarise the change in {language}: one short subject line, then an \
         optional blank line and a few bullet points for larger changes. \
         reply with the commit message only."
    )
}

fn push_file_list(prompt: &mut String, label: &str, files: &[String]) {
    if files.is_empty() {
        return;
    }
    prompt.push_str(&format!("{label} ({}):\n", files.len()));
    for file in files {
        prompt.push_str(&format!("- {file}\n"));
    }
    prompt.push('\n');
}

/// prompt for a bare diff text
pub fn construct_prompt(diff_content: &str, language: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "write a commit message in {language} for the following subversion changes.\n\n"
    ));
    push_diff(&mut prompt, diff_content);
    prompt
}

/// prompt that also lists which files were added, modified and deleted
pub fn construct_payload_prompt(payload: &DiffPayload, language: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "write a commit message in {language} for the following subversion changes.\n\n"
    ));
    prompt.push_str(&format!("📊 CHANGE SUMMARY: {}\n\n", payload.summary()));

    push_file_list(&mut prompt, "added files", &payload.added_files);
    push_file_list(&mut prompt, "modified files", &payload.modified_files);
    push_file_list(&mut prompt, "deleted files", &payload.deleted_files);

    push_diff(&mut prompt, &payload.diff_content);
    prompt
}

fn push_diff(prompt: &mut String, diff_content: &str) {
    if diff_content == NO_MODIFICATIONS {
        prompt.push_str("there are no textual modifications; describe the file changes above.\n");
        return;
    }
    prompt.push_str("diff:\n```diff\n");
    prompt.push_str(&truncate_with_ellipsis(diff_content, MAX_DIFF_CHARS));
    prompt.push_str("\n```\n");
}
