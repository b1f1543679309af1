// validation and message processing module

use anyhow::Result;

/// longest subject line we accept without complaint
pub const MAX_SUBJECT_LEN: usize = 100;

/// extract commit message from ai response
pub fn extract_commit_message(response: &str) -> String {
    let response = strip_reasoning(response.trim());
    let lines: Vec<&str> = response.lines().collect();
    let mut commit_lines = Vec::new();
    let mut in_code_block = false;
    let mut saw_code_block = false;

    // first try: a fenced block holds the message
    for line in &lines {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if in_code_block {
                break;
            }
            in_code_block = true;
            saw_code_block = true;
            continue;
        }
        if in_code_block {
            commit_lines.push(trimmed.to_string());
        }
    }

    if saw_code_block && commit_lines.iter().any(|l| !l.is_empty()) {
        return clean_commit_message(&commit_lines.join("\n"));
    }

    // fallback: the whole response is the message
    clean_commit_message(&response)
}

/// drop `<think>...</think>` sections some reasoning models emit
fn strip_reasoning(response: &str) -> String {
    let mut out = response.to_string();
    while let (Some(start), Some(end)) = (out.find("<think>"), out.find("</think>")) {
        if end < start {
            break;
        }
        out.replace_range(start..end + "</think>".len(), "");
    }
    out.trim().to_string()
}

/// clean commit message of unwanted characters
pub fn clean_commit_message(msg: &str) -> String {
    let msg = msg.trim();

    // remove common ai response artifacts
    let lowered = msg.to_lowercase();
    let mut msg = msg;
    for prefix in [
        "commit message:",
        "generated commit:",
        "here's the commit message:",
        "here is the commit message:",
    ] {
        if lowered.starts_with(prefix) {
            msg = msg.get(prefix.len()..).unwrap_or(msg);
            break;
        }
    }
    let msg = msg
        .trim()
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .trim_matches('"')
        .trim_matches('`');

    let mut cleaned_lines: Vec<String> = Vec::new();
    let mut in_body = false;

    for line in msg.lines() {
        let trimmed = line.trim();

        // skip meta-commentary
        if trimmed.starts_with("This commit")
            || trimmed.starts_with("The commit")
            || trimmed.starts_with("Note:")
            || trimmed.starts_with("Explanation:")
        {
            continue;
        }

        if cleaned_lines.is_empty() {
            if !trimmed.is_empty() {
                cleaned_lines.push(trimmed.trim_matches('*').trim().to_string());
            }
            continue;
        }

        if trimmed.is_empty() {
            // collapse runs of blank lines
            if cleaned_lines.last().is_some_and(|l| !l.is_empty()) {
                cleaned_lines.push(String::new());
            }
            in_body = true;
            continue;
        }

        // consistent bullet format
        if trimmed.starts_with('-') || trimmed.starts_with('*') || trimmed.starts_with('•') {
            let content = trimmed.trim_start_matches(['-', '*', '•']).trim();
            if !in_body {
                cleaned_lines.push(String::new());
                in_body = true;
            }
            cleaned_lines.push(format!("- {content}"));
        } else {
            cleaned_lines.push(trimmed.to_string());
        }
    }

    while cleaned_lines.last().is_some_and(|l| l.is_empty()) {
        cleaned_lines.pop();
    }

    cleaned_lines.join("\n")
}

/// validate a commit message before it is handed to svn
pub fn validate_commit_message(msg: &str) -> Result<()> {
    let subject = msg.lines().next().unwrap_or("").trim();
    if subject.is_empty() {
        return Err(anyhow::anyhow!("commit message is empty"));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(anyhow::anyhow!(
            "subject line too long ({} chars, max {MAX_SUBJECT_LEN})",
            subject.chars().count()
        ));
    }
    Ok(())
}
