//! Text preprocessing ahead of embedding.

/// Normalize text for embedding.
///
/// Whitespace of any kind becomes a single space, other control
/// characters are dropped, the result is trimmed and then cut to at most
/// `max_chars` characters (never splitting a code point). Applying it to
/// its own output changes nothing.
pub fn preprocess_text_for_embedding(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(text.len().min(max_chars.saturating_mul(4)));
    let mut pending_space = false;
    let mut count = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() {
            if count + 1 >= max_chars {
                break;
            }
            out.push(' ');
            count += 1;
        }
        pending_space = false;
        if count >= max_chars {
            break;
        }
        out.push(c);
        count += 1;
    }

    out
}

/// Rough token estimate (about four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_collapses_and_trims() {
        assert_eq!(
            preprocess_text_for_embedding("  hello \n\n\t world  ", 100),
            "hello world"
        );
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(preprocess_text_for_embedding("a\u{0}b\u{7}c", 100), "abc");
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        assert_eq!(preprocess_text_for_embedding("héllo wörld", 4), "héll");
        assert_eq!(preprocess_text_for_embedding("ab cd", 3), "ab");
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(preprocess_text_for_embedding("", 10), "");
        assert_eq!(preprocess_text_for_embedding(" \t\n", 10), "");
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }

    proptest! {
        #[test]
        fn prop_preprocess_is_idempotent(text in "\\PC{0,200}|[ \\t\\n\\r\\x00-\\x1f a-z]{0,200}", max in 1usize..300) {
            let once = preprocess_text_for_embedding(&text, max);
            let twice = preprocess_text_for_embedding(&once, max);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_preprocess_respects_budget(text in ".{0,400}", max in 1usize..300) {
            let out = preprocess_text_for_embedding(&text, max);
            prop_assert!(out.chars().count() <= max);
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
