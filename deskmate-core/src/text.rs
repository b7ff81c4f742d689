//! Text normalization and keyword relevance scoring.
//!
//! Both queries and corpus content go through [`normalize`] so comparisons are
//! symmetric. [`keyword_score`] is a cheap, order-insensitive relevance proxy:
//! the fraction of query words (longer than two characters) that appear as a
//! substring of the candidate. Substring containment also matches
//! partial words too ("return" matches "returns").

use std::sync::LazyLock;

use regex::Regex;

/// Query words of this many characters or fewer are ignored.
const MIN_WORD_CHARS: usize = 2;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[?.!,\-'"()]"#).expect("punctuation pattern is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Lower-case, strip `?.!,-'"()`, collapse whitespace, trim.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Words of a normalized query that take part in scoring.
pub fn qualifying_words(normalized_query: &str) -> Vec<&str> {
    normalized_query
        .split(' ')
        .filter(|w| w.chars().count() > MIN_WORD_CHARS)
        .collect()
}

/// Fraction of qualifying query words contained in `content`, in `[0, 1]`.
///
/// Returns 0 when the query has no qualifying words.
pub fn keyword_score(query: &str, content: &str) -> f64 {
    let query = normalize(query);
    let words = qualifying_words(&query);
    if words.is_empty() {
        return 0.0;
    }

    let content = normalize(content);
    let matched = words.iter().filter(|w| content.contains(**w)).count();
    matched as f64 / words.len() as f64
}

/// Char-boundary-safe prefix of at most `max_chars` characters.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(
            normalize("  What's the RETURN policy?!  (for   shoes) "),
            "whats the return policy for shoes"
        );
        assert_eq!(normalize("a-b,c.d"), "abcd");
        assert_eq!(normalize("tabs\tand\nnewlines"), "tabs and newlines");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Hello,   World!!",
            "  \"quoted\" (text) - with -- dashes ",
            "מה שעות הפתיחה?",
            "MiXeD CaSe\t\tTabs",
            "...",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_short_word_queries_score_zero() {
        for query in ["a", "is it ok", "?? !!", "", "מה זה"] {
            assert_eq!(keyword_score(query, "is it ok to wear it"), 0.0, "{:?}", query);
        }
    }

    #[test]
    fn test_keyword_score_is_fraction_of_words() {
        // "where", "the", "staff", "room": 2 of 4 found
        let score = keyword_score("Where is the staff room?", "The staff entrance is on the left");
        assert!((score - 0.5).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_keyword_score_uses_substring_containment() {
        assert_eq!(keyword_score("return", "Returns accepted within 30 days"), 1.0);
    }

    #[test]
    fn test_keyword_score_is_bounded() {
        let pairs = [
            ("shift swap shift swap", "how to swap a shift"),
            ("vacation days", ""),
            ("one two three four", "one two three four five"),
            ("רשת אספקה", "אספקה"),
        ];
        for (q, c) in pairs {
            let s = keyword_score(q, c);
            assert!((0.0..=1.0).contains(&s), "{} out of range for {:?}", s, q);
        }
    }

    #[test]
    fn test_hebrew_word_length_counts_characters() {
        // "מה" is two characters (four bytes) and must be discarded.
        let norm = normalize("מה שעות הפתיחה");
        assert_eq!(qualifying_words(&norm), vec!["שעות", "הפתיחה"]);
        assert!((keyword_score("מה שעות הפתיחה", "שעות פעילות החנות") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("שעות פעילות", 4), "שעות…");
        assert_eq!(excerpt("abcdef", 3), "abc…");
    }
}
