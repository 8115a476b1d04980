//! Voice command parsing
//!
//! Maps recognised transcripts onto a registry of command patterns using
//! keyword/phrase matching with a fuzzy fallback, extracts structured data
//! (student names, grades, search queries) and HTML-escapes everything it
//! hands back.
//!
//! ## Matching order
//!
//! 1. Set-grade phrasings (Indonesian and English, positional name/value)
//! 2. Every registered pattern: exact 1.0, whole-word containment 0.9,
//!    otherwise word-set Jaccard; the best score at or above the threshold
//!    wins and equal scores go to the earliest registered command

pub mod extract;
pub mod matcher;
pub mod normalize;
pub mod parser;
pub mod registry;
pub mod sanitize;

pub use parser::{
    CommandParser, ParsedVoiceCommand, ParserError, DEFAULT_MIN_CONFIDENCE, GRADE_VALUE, QUERY,
    STUDENT_NAME,
};
pub use registry::{actions, default_commands, CommandPattern, CommandRegistry, CommandSet, RegistryError};
pub use sanitize::escape_html;
