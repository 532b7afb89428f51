// Change presentation for previews: highlighted replacement view and a coarse
// removed/added summary. Neither is authoritative; the preview engine is.

use serde::Serialize;
use std::fmt;

use crate::pattern::{compile, MatchOptions};

/// Characters of each side kept by `summarize_diff`
pub const SUMMARY_CHARS: usize = 200;

const ELLIPSIS: &str = "...";

/// Opening/closing text wrapped around each highlighted replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMarker {
    pub open: String,
    pub close: String,
}

impl ChangeMarker {
    pub fn html() -> Self {
        Self {
            open: "<mark>".to_string(),
            close: "</mark>".to_string(),
        }
    }

    /// Bold yellow, for terminals
    pub fn ansi() -> Self {
        Self {
            open: "\x1b[1;33m".to_string(),
            close: "\x1b[0m".to_string(),
        }
    }
}

impl Default for ChangeMarker {
    fn default() -> Self {
        Self::html()
    }
}

/// Highlight `replacement` wherever `pattern` occurs in `text`, using the HTML marker.
pub fn highlight(text: &str, pattern: &str, replacement: &str) -> String {
    highlight_with(text, pattern, replacement, &ChangeMarker::default())
}

/// Split `text` on `pattern` and put a marked `replacement` between the pieces.
///
/// The pattern is always escaped and matched case-insensitively, whatever mode the
/// preview itself runs in. Empty input or a pattern that cannot compile returns `text`.
pub fn highlight_with(text: &str, pattern: &str, replacement: &str, marker: &ChangeMarker) -> String {
    if text.is_empty() || pattern.is_empty() {
        return text.to_string();
    }

    let Ok(matcher) = compile(pattern, MatchOptions::literal()) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for range in matcher.find_iter(text) {
        out.push_str(&text[last..range.start]);
        out.push_str(&marker.open);
        out.push_str(replacement);
        out.push_str(&marker.close);
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

/// Coarse two-line summary of a transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffSummary {
    NoChanges,
    Changed { removed: String, added: String },
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffSummary::NoChanges => write!(f, "No changes detected"),
            DiffSummary::Changed { removed, added } => write!(f, "- {removed}\n+ {added}"),
        }
    }
}

pub fn summarize_diff(original_text: &str, transformed_text: &str) -> DiffSummary {
    if original_text == transformed_text {
        return DiffSummary::NoChanges;
    }

    DiffSummary::Changed {
        removed: truncate_with_ellipsis(original_text, SUMMARY_CHARS),
        added: truncate_with_ellipsis(transformed_text, SUMMARY_CHARS),
    }
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    format!("{}{}", &text[..end], ELLIPSIS)
}

/// Original text next to its transformed form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideBySide<'a> {
    pub original: &'a str,
    pub after: &'a str,
}

impl<'a> SideBySide<'a> {
    /// An empty preview shows the original on both sides
    pub fn new(original: &'a str, transformed: &'a str) -> Self {
        let after = if transformed.is_empty() { original } else { transformed };
        Self { original, after }
    }
}
