//! Applying accepted suggestions to a text buffer
//!
//! Pure text-in/text-out. The presentation layer maps the returned byte range
//! back onto whatever it renders.

use crate::suggest::Suggestion;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub text: String,
    pub applied: bool,
    /// Byte range of the replacement in `text` when applied
    pub range: Option<Range<usize>>,
}

impl PatchOutcome {
    fn stale(text: &str) -> Self {
        Self {
            text: text.to_string(),
            applied: false,
            range: None,
        }
    }
}

/// Applies suggestions left to right with a search cursor that only moves
/// forward, so repeated occurrences of one literal are each matched once.
#[derive(Debug, Clone, Default)]
pub struct TextPatcher {
    cursor: usize,
}

impl TextPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset where the next search starts
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Splice `suggestion.replacement` over the first occurrence of
    /// `suggestion.original` at or after the cursor. A missing target leaves
    /// the text and the cursor untouched.
    pub fn apply(&mut self, current: &str, suggestion: &Suggestion) -> PatchOutcome {
        let from = char_boundary_at_or_after(current, self.cursor);
        let Some(start) = find_target(current, &suggestion.original, from) else {
            tracing::debug!(original = %suggestion.original, "suggestion target no longer present");
            return PatchOutcome::stale(current);
        };

        let end = start + suggestion.original.len();
        let mut text = String::with_capacity(
            current.len() - suggestion.original.len() + suggestion.replacement.len(),
        );
        text.push_str(&current[..start]);
        text.push_str(&suggestion.replacement);
        text.push_str(&current[end..]);

        let replaced_end = start + suggestion.replacement.len();
        self.cursor = replaced_end;
        PatchOutcome {
            text,
            applied: true,
            range: Some(start..replaced_end),
        }
    }
}

/// Apply one suggestion searching from the start of the text.
pub fn apply_once(current: &str, suggestion: &Suggestion) -> PatchOutcome {
    TextPatcher::new().apply(current, suggestion)
}

/// Byte offset of the first occurrence of `target` at or after `from`.
///
/// An occurrence never starts or ends inside a word: "i" is not found in
/// "said" and "its" is not found in "visits". Empty targets are never found.
pub fn find_target(text: &str, target: &str, from: usize) -> Option<usize> {
    if target.is_empty() || from > text.len() || !text.is_char_boundary(from) {
        return None;
    }
    let mut search = from;
    while let Some(found) = text[search..].find(target) {
        let start = search + found;
        let end = start + target.len();
        if on_word_edges(text, start, end) {
            return Some(start);
        }
        search = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Start offsets of every non-overlapping occurrence of `target`, left to right.
pub fn target_offsets(text: &str, target: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut from = 0;
    while let Some(start) = find_target(text, target, from) {
        offsets.push(start);
        from = start + target.len();
    }
    offsets
}

fn on_word_edges(text: &str, start: usize, end: usize) -> bool {
    let inner = &text[start..end];
    let splits_left = inner.chars().next().is_some_and(is_word_char)
        && text[..start].chars().next_back().is_some_and(is_word_char);
    let splits_right = inner.chars().next_back().is_some_and(is_word_char)
        && text[end..].chars().next().is_some_and(is_word_char);
    !splits_left && !splits_right
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn char_boundary_at_or_after(text: &str, offset: usize) -> usize {
    if offset >= text.len() {
        return text.len();
    }
    (offset..=text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len())
}
