//! Structured data extraction
//!
//! Free text (a student name, a search query) is whatever remains after the
//! command's own words and filler words are removed. Grade commands use
//! positional templates instead, since the name and the value can appear in
//! either order depending on phrasing.

use super::normalize::{NormalizedText, Token};
use std::collections::HashSet;
use std::ops::Range;

/// Words that never belong to extracted free text
const FILLER_WORDS: &[&str] = &[
    "siswa", "murid", "student", "untuk", "for", "tolong", "please", "bernama", "named",
];

/// Confidence reported for a set-grade template match
pub const SET_GRADE_CONFIDENCE: f64 = 0.95;

/// Highest accepted grade
const MAX_GRADE: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
enum Slot {
    Word(&'static str),
    /// One or more words naming the student
    Name,
    /// A grade between 0 and 100
    Value,
}

use Slot::{Name, Value, Word};

/// Set-grade phrasings, tried in order
///
/// Phrasings with a connective between name and value come before the
/// bare form so the connective is not swallowed into the name.
const SET_GRADE_TEMPLATES: &[&[Slot]] = &[
    // Indonesian
    &[Word("set"), Word("nilai"), Name, Word("menjadi"), Value],
    &[Word("set"), Word("nilai"), Name, Word("jadi"), Value],
    &[Word("set"), Name, Word("nilai"), Value],
    &[Word("set"), Word("nilai"), Name, Value],
    &[Word("beri"), Word("nilai"), Value, Word("untuk"), Name],
    &[Word("beri"), Word("nilai"), Value, Word("kepada"), Name],
    &[Word("beri"), Name, Word("nilai"), Value],
    &[Word("input"), Word("nilai"), Name, Value],
    &[Word("masukkan"), Word("nilai"), Name, Value],
    &[Word("nilai"), Name, Value],
    // English
    &[Word("set"), Word("grade"), Word("for"), Name, Word("to"), Value],
    &[Word("set"), Word("grade"), Value, Word("for"), Name],
    &[Word("set"), Name, Word("grade"), Word("to"), Value],
    &[Word("set"), Name, Word("grade"), Value],
    &[Word("set"), Word("grade"), Name, Value],
    &[Word("give"), Name, Word("grade"), Value],
    &[Word("give"), Name, Value],
    &[Word("grade"), Name, Value],
];

/// Student and grade extracted from a set-grade phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeMatch {
    /// Student name with the speaker's casing
    pub student_name: String,
    /// Grade as spoken, with `.` as the decimal separator
    pub grade_value: String,
}

#[derive(Debug, Clone, Default)]
struct Captures {
    name: Option<Range<usize>>,
    value: Option<usize>,
}

/// Match a transcript against the set-grade phrasings
pub fn match_set_grade(text: &NormalizedText) -> Option<GradeMatch> {
    let words = text.words();

    let captures = SET_GRADE_TEMPLATES
        .iter()
        .find_map(|template| match_slots(template, &words, 0, Captures::default()))?;

    let name = captures.name?;
    let value = captures.value?;
    let student_name = join_without_fillers(&text.tokens()[name])?;

    Some(GradeMatch {
        student_name,
        grade_value: words[value].to_string(),
    })
}

fn match_slots(slots: &[Slot], words: &[&str], pos: usize, captures: Captures) -> Option<Captures> {
    let Some((slot, rest)) = slots.split_first() else {
        return (pos == words.len()).then_some(captures);
    };

    match slot {
        Word(expected) => {
            if words.get(pos).copied() != Some(*expected) {
                return None;
            }
            match_slots(rest, words, pos + 1, captures)
        }
        Value => {
            parse_grade(words.get(pos)?)?;
            let mut captures = captures;
            captures.value = Some(pos);
            match_slots(rest, words, pos + 1, captures)
        }
        Name => {
            for end in pos + 1..=words.len() {
                if !is_name_word(words[end - 1]) {
                    break;
                }
                let mut attempt = captures.clone();
                attempt.name = Some(pos..end);
                if let Some(found) = match_slots(rest, words, end, attempt) {
                    return Some(found);
                }
            }
            None
        }
    }
}

fn is_name_word(word: &str) -> bool {
    word.chars().any(char::is_alphabetic)
}

/// Parse a grade in [0, 100]
pub fn parse_grade(word: &str) -> Option<f64> {
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    word.parse::<f64>()
        .ok()
        .filter(|value| (0.0..=MAX_GRADE).contains(value))
}

/// Free text left after removing the command's own words and fillers
///
/// `phrases` are the matched command's normalised phrases. Returns `None`
/// when nothing is left.
pub fn extract_free_text(text: &NormalizedText, phrases: &[String]) -> Option<String> {
    let command_words: HashSet<&str> = phrases.iter().flat_map(|p| p.split(' ')).collect();

    let remaining: Vec<Token> = text
        .tokens()
        .iter()
        .filter(|t| !command_words.contains(t.normalized.as_str()))
        .cloned()
        .collect();

    join_without_fillers(&remaining)
}

fn join_without_fillers(tokens: &[Token]) -> Option<String> {
    let kept: Vec<&str> = tokens
        .iter()
        .filter(|t| !FILLER_WORDS.contains(&t.normalized.as_str()))
        .map(|t| t.original.as_str())
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}
