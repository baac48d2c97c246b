//! Query text sanitization and tokenization.

use hubsearch_core::{Error, Result};

/// Reduce free text to letters, digits, and single spaces.
///
/// Query-language operators and punctuation become separators, the
/// result is lowercased, and it is cut to `max_chars` characters at a
/// word boundary where possible. Text with nothing searchable left is a
/// [`SearchParameter`](Error::SearchParameter) error.
pub fn sanitize_query(text: &str, max_chars: usize) -> Result<String> {
    let mut out = String::with_capacity(text.len().min(max_chars * 4));
    let mut count = 0;
    for token in tokenize(text) {
        let needed = token.chars().count() + usize::from(count > 0);
        if count + needed > max_chars {
            if count == 0 {
                out.extend(token.chars().take(max_chars));
            }
            break;
        }
        if count > 0 {
            out.push(' ');
        }
        out.push_str(&token);
        count += needed;
    }

    if out.is_empty() {
        return Err(Error::search_parameter(
            "search text has no searchable characters",
        ));
    }
    Ok(out)
}

/// Lowercased alphanumeric runs of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct tokens of `text`, in first-seen order.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

// ============================================================================
// Tests
// ============================================================================
