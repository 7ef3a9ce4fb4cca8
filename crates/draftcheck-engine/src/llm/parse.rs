//! Turning an untrusted model reply into suggestions
//!
//! The reply should be a bare JSON object, but models wrap it in markdown
//! fences or prose often enough that a few salvage candidates are tried
//! before giving up.

use draftcheck_core::{AnalysisError, Suggestion, SuggestionType};
use serde::Deserialize;
use serde_json::Value;

/// Maximum length for response content quoted in errors and logs
const MAX_ERROR_CONTENT_LEN: usize = 200;

/// Maximum number of balanced JSON fragments pulled out of one candidate
const MAX_FRAGMENTS: usize = 4;

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(rename = "type")]
    kind: String,
    original: String,
    suggestion: String,
    #[serde(default)]
    explanation: Option<String>,
}

/// Parse the message content of a chat response.
///
/// Fails with `MalformedResponse` when no candidate is a JSON object with a
/// `suggestions` array. Individual entries with an unknown type, missing
/// fields, or an empty `original` are dropped.
pub fn parse_suggestions(content: &str) -> Result<Vec<Suggestion>, AnalysisError> {
    let mut last_err: Option<String> = None;
    let mut saw_object = false;

    for candidate in json_candidates(content) {
        let value = match serde_json::from_str::<Value>(&candidate) {
            Ok(value) => value,
            Err(err) => {
                last_err = Some(err.to_string());
                continue;
            }
        };
        saw_object |= value.is_object();
        if let Some(entries) = value.get("suggestions").and_then(Value::as_array) {
            return Ok(entries.iter().filter_map(convert_entry).collect());
        }
    }

    let reason = if saw_object {
        "response has no suggestions array".to_string()
    } else {
        format!(
            "invalid JSON ({})",
            last_err.unwrap_or_else(|| "empty content".to_string())
        )
    };
    tracing::debug!(
        reason = %reason,
        content = %sanitize_api_response(content),
        "unusable suggestion response"
    );
    Err(AnalysisError::MalformedResponse(reason))
}

fn convert_entry(entry: &Value) -> Option<Suggestion> {
    let raw = match RawSuggestion::deserialize(entry) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!(error = %err, "dropping suggestion with missing fields");
            return None;
        }
    };
    let Some(kind) = SuggestionType::from_label(&raw.kind.trim().to_ascii_uppercase()) else {
        tracing::debug!(kind = %raw.kind, "dropping suggestion with unknown type");
        return None;
    };
    if raw.original.is_empty() {
        return None;
    }
    Some(Suggestion::new(
        kind,
        raw.original,
        raw.suggestion,
        raw.explanation.unwrap_or_default(),
    ))
}

/// Candidate JSON texts, most literal first
fn json_candidates(content: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    push_unique_candidate(&mut candidates, content);
    if let Some(stripped) = strip_markdown_fences(content) {
        push_unique_candidate(&mut candidates, stripped);
    }

    let mut idx = 0usize;
    while idx < candidates.len() {
        let current = candidates[idx].clone();
        for fragment in extract_object_fragments(&current, MAX_FRAGMENTS) {
            push_unique_candidate(&mut candidates, fragment);
        }
        idx += 1;
    }
    candidates
}

fn push_unique_candidate(candidates: &mut Vec<String>, candidate: impl Into<String>) {
    let candidate = candidate.into();
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return;
    }
    if !candidates.iter().any(|existing| existing == trimmed) {
        candidates.push(trimmed.to_string());
    }
}

fn strip_markdown_fences(content: &str) -> Option<String> {
    let trimmed = content.trim();
    let without_open = trimmed.strip_prefix("```")?;
    let after_header = match without_open.find('\n') {
        Some(newline_idx) => &without_open[newline_idx + 1..],
        None => without_open,
    };
    let end_idx = after_header.rfind("```")?;
    Some(after_header[..end_idx].trim().to_string())
}

fn extract_balanced_object_from(content: &str, start: usize) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    let end = start + offset + ch.len_utf8();
                    return Some(content[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn extract_object_fragments(content: &str, max_fragments: usize) -> Vec<String> {
    let mut out = Vec::new();
    for (idx, ch) in content.char_indices() {
        if out.len() >= max_fragments {
            break;
        }
        if ch == '{' {
            if let Some(fragment) = extract_balanced_object_from(content, idx) {
                push_unique_candidate(&mut out, fragment);
            }
        }
    }
    out
}

/// Redact and shorten API content before it reaches a log line.
pub(crate) fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "api_key",
        "apikey",
        "secret",
        "password",
        "credential",
        "bearer",
        "sk-",
    ];

    let truncated = truncate_str(content, MAX_ERROR_CONTENT_LEN);
    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return "(response details redacted - may contain sensitive data)".to_string();
    }
    truncated.to_string()
}

/// Truncate a string for display (Unicode-safe)
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
