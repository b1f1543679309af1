use anyhow::Result;
use encoding_rs::UTF_8;
use lazy_static::lazy_static;
use regex::Regex;
use std::env;
use std::path::Path;

lazy_static! {
    // common binary file extensions
    static ref BINARY_EXTENSIONS: Regex = Regex::new(
        r"(?i)\.(jpg|jpeg|png|gif|bmp|ico|webp|mp3|mp4|avi|mov|wmv|flv|mkv|woff|woff2|eot|ttf|otf|exe|dll|so|dylib|bin|dat|o|obj|lib|a|class|jar|war|ear|zip|tar|gz|rar|7z|pdf|doc|docx|xls|xlsx)$"
    ).unwrap();
}

/// decode raw process output; invalid utf-8 sequences become U+FFFD
pub fn decode_output(bytes: &[u8]) -> String {
    let (text, _had_errors) = UTF_8.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// check whether a path looks like a binary file that should not be diffed as text
pub fn is_binary_path(path: &Path) -> bool {
    BINARY_EXTENSIONS.is_match(&path.to_string_lossy())
}

/// check whether already-retrieved content looks binary
pub fn looks_binary(content: &str) -> bool {
    content.contains('\0')
}

/// truncate a string to a maximum length with ellipsis
pub fn truncate_with_ellipsis(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        text.to_string()
    } else {
        // Use Unicode-safe truncation to avoid panics with emoji characters
        let truncate_at = std::cmp::min(max_length.saturating_sub(3), text.len());
        let mut end_pos = truncate_at;

        // Find the nearest character boundary before truncate_at
        while end_pos > 0 && !text.is_char_boundary(end_pos) {
            end_pos -= 1;
        }

        format!("{}...", &text[..end_pos])
    }
}

/// make sure an openrouter key is available before any ai work starts
pub fn check_openrouter_api_key() -> Result<()> {
    match env::var("OPENROUTER_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(anyhow::anyhow!(
            "OPENROUTER_API_KEY environment variable is not set. set it with: export OPENROUTER_API_KEY=your-api-key"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_and_falls_back_for_invalid_bytes() {
        assert_eq!(decode_output("héllo".as_bytes()), "héllo");
        assert_eq!(decode_output(&[0x66, 0x6f, 0xff]), "fo\u{fffd}");
        // a truncated multi-byte sequence mid-stream is replaced, the rest kept
        assert_eq!(decode_output(&[0x61, 0xe2, 0x82, 0x62]), "a\u{fffd}b");
        // a leading bom is content, not stripped
        assert_eq!(decode_output(&[0xef, 0xbb, 0xbf, 0x78]), "\u{feff}x");
    }

    #[test]
    fn detects_binary_extensions() {
        assert!(is_binary_path(Path::new("assets/logo.PNG")));
        assert!(!is_binary_path(Path::new("src/main.rs")));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("ééééé", 6), "é...");
    }
}
