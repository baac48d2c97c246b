//! Match highlighting and abstract windows.
//!
//! Terms are matched case-insensitively on word boundaries, longest term
//! first, so `learning` wins over `learn` when both are present. Source
//! text is HTML-escaped; only the markers are inserted raw.

use hubsearch_core::{Error, Result};
use regex::Regex;

/// Wraps query terms in markers.
#[derive(Debug, Clone)]
pub struct Highlighter {
    pattern: Option<Regex>,
    open: String,
    close: String,
}

impl Highlighter {
    /// Build a highlighter for `terms`. No terms means no highlighting.
    pub fn new(terms: &[String], open: &str, close: &str) -> Result<Self> {
        let mut sorted: Vec<&str> = terms
            .iter()
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .collect();
        sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        sorted.dedup();

        let pattern = if sorted.is_empty() {
            None
        } else {
            let alternation: Vec<String> = sorted.iter().map(|t| regex::escape(t)).collect();
            let source = format!(r"(?i)\b(?:{})\b", alternation.join("|"));
            Some(
                Regex::new(&source)
                    .map_err(|e| Error::search_parameter(format!("cannot highlight query: {e}")))?,
            )
        };

        Ok(Self {
            pattern,
            open: open.to_string(),
            close: close.to_string(),
        })
    }

    /// Escape `text` and wrap every match.
    pub fn highlight(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return escape_html(text);
        };

        let mut out = String::with_capacity(text.len() + 16);
        let mut last = 0;
        for m in pattern.find_iter(text) {
            out.push_str(&escape_html(&text[last..m.start()]));
            out.push_str(&self.open);
            out.push_str(&escape_html(m.as_str()));
            out.push_str(&self.close);
            last = m.end();
        }
        out.push_str(&escape_html(&text[last..]));
        out
    }

    /// Up to `max_chars` characters of `text` around the first match,
    /// widened to whole words and marked with `...` where cut. Without a
    /// match the window is the start of the text.
    pub fn window<'t>(&self, text: &'t str, max_chars: usize) -> std::borrow::Cow<'t, str> {
        if text.chars().count() <= max_chars {
            return text.into();
        }
        let pos = self
            .pattern
            .as_ref()
            .and_then(|p| p.find(text))
            .map_or(0, |m| m.start());

        let start = back_chars(text, pos, max_chars / 4);
        let end = forward_chars(text, start, max_chars);

        let start = if start > 0 {
            text[..start]
                .rfind(char::is_whitespace)
                .map(|p| p + char_len_at(text, p))
                .unwrap_or(start)
        } else {
            0
        };
        let end = if end < text.len() {
            text[end..]
                .find(char::is_whitespace)
                .map(|p| end + p)
                .unwrap_or(end)
        } else {
            text.len()
        };

        let mut snippet = String::new();
        if start > 0 {
            snippet.push_str("...");
        }
        snippet.push_str(text[start..end].trim());
        if end < text.len() {
            snippet.push_str("...");
        }
        snippet.into()
    }
}

fn back_chars(text: &str, byte_pos: usize, n: usize) -> usize {
    if n == 0 {
        return byte_pos;
    }
    text[..byte_pos]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(byte_pos, |(i, _)| i)
}

fn forward_chars(text: &str, byte_pos: usize, n: usize) -> usize {
    text[byte_pos..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| byte_pos + i)
}

fn char_len_at(text: &str, byte_pos: usize) -> usize {
    text[byte_pos..].chars().next().map_or(1, char::len_utf8)
}

/// Minimal HTML escaping for text content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
