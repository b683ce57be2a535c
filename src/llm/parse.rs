//! Turning raw completion text into code or typed data.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

const MAX_ERROR_CONTENT_LEN: usize = 200;

fn fence_patterns() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"(?is)```python\s*\n(.*?)\n```",
            r"(?s)```\s*\n(.*?)\n```",
            r"(?s)```\w*\s*(.*?)\n```",
        ]
        .map(|p| Regex::new(p).expect("static pattern"))
    })
}

/// Pull source code out of a completion.
///
/// Tried in order: a fence tagged `python`, an untagged fence, a fence whose
/// tag and code share the opening line. Without any fence the text itself is
/// used. Surrounding blank lines are dropped; indentation is kept.
pub fn extract_code_block(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let code = fence_patterns()
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());

    strip_blank_edges(code).to_string()
}

fn strip_blank_edges(code: &str) -> &str {
    let code = code.trim_end();
    let first = code
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(code.len());
    let line_start = code[..first].rfind('\n').map_or(0, |i| i + 1);
    &code[line_start..]
}

/// Parse a structured response, salvaging JSON wrapped in fences or prose.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T> {
    let mut candidates = vec![content.trim().to_string()];

    let fenced = extract_code_block(content);
    if fenced != candidates[0] {
        candidates.push(fenced);
    }
    if let Some(obj) = first_balanced_object(content) {
        candidates.push(obj);
    }

    let mut last_err = None;
    for candidate in &candidates {
        match serde_json::from_str::<T>(candidate) {
            Ok(data) => return Ok(data),
            Err(e) => last_err = Some(e.to_string()),
        }
    }

    Err(Error::StructuredResponse(format!(
        "{} (content: {})",
        last_err.unwrap_or_else(|| "empty response".into()),
        truncate(content.trim(), MAX_ERROR_CONTENT_LEN)
    )))
}

fn first_balanced_object(content: &str) -> Option<String> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(content[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{cut}...")
}
