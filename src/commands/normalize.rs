//! Transcript normalisation for matching
//!
//! Matching works on lowercase tokens stripped of punctuation. Each token
//! keeps the original word it came from, so extracted spans can be reported
//! with the speaker's casing.

use regex::Regex;
use std::sync::LazyLock;

/// Anything that is not a letter or a digit
static NON_WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]").unwrap());

/// A number with an optional decimal part, possibly wrapped in punctuation
static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\p{L}\p{N}]*(\d+(?:[.,]\d+)?)[^\p{L}\p{N}]*$").unwrap()
});

/// Punctuation at either end of a word
static EDGE_PUNCT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\p{L}\p{N}<>&]+|[^\p{L}\p{N}<>&]+$").unwrap());

/// A normalised token and the original word it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub normalized: String,
    pub original: String,
}

/// A transcript split into aligned tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    tokens: Vec<Token>,
}

impl NormalizedText {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Normalised words
    pub fn words(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.normalized.as_str()).collect()
    }

    /// Normalised words joined by single spaces
    pub fn joined(&self) -> String {
        self.words().join(" ")
    }
}

/// Normalise a single word
///
/// Numbers keep their decimal separator (as `.`); everything else loses
/// punctuation and is lowercased.
pub fn normalize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if let Some(caps) = NUMBER_PATTERN.captures(&lower) {
        return caps[1].replace(',', ".");
    }
    NON_WORD_PATTERN.replace_all(&lower, "").into_owned()
}

/// Split a transcript into aligned tokens, dropping words with no letters or digits
pub fn normalize(text: &str) -> NormalizedText {
    let tokens = text
        .split_whitespace()
        .filter_map(|word| {
            let normalized = normalize_word(word);
            if normalized.is_empty() {
                return None;
            }
            Some(Token {
                normalized,
                original: trim_edge_punctuation(word).to_string(),
            })
        })
        .collect();

    NormalizedText { tokens }
}

/// Normalise a phrase into a single matching key
pub fn normalize_phrase(text: &str) -> String {
    normalize(text).joined()
}

/// Remove punctuation from both ends of a word, keeping markup characters
///
/// Markup is left in place so the sanitiser escapes it rather than the
/// extractor silently altering it.
pub fn trim_edge_punctuation(word: &str) -> &str {
    match EDGE_PUNCT_PATTERN.find_iter(word).collect::<Vec<_>>().as_slice() {
        [] => word,
        [m] if m.start() == 0 && m.end() == word.len() => word,
        [m] if m.start() == 0 => &word[m.end()..],
        [m] => &word[..m.start()],
        [first, last, ..] => &word[first.end()..last.start()],
    }
}
