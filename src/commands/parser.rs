//! Voice command parser
//!
//! Turns a transcript into a [`ParsedVoiceCommand`]: the set-grade phrasings
//! are tried first, then every registered pattern is scored and the best one
//! at or above the confidence threshold wins. Output text is HTML-escaped.

use super::extract::{extract_free_text, match_set_grade, SET_GRADE_CONFIDENCE};
use super::matcher::best_match;
use super::normalize::{normalize, NormalizedText};
use super::registry::{actions, CommandPattern, CommandRegistry, RegistryError};
use super::sanitize::escape_html;
use crate::config::{ConfigError, ParserConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default minimum similarity for the general matcher
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Data key for an extracted student name
pub const STUDENT_NAME: &str = "studentName";
/// Data key for an extracted grade
pub const GRADE_VALUE: &str = "gradeValue";
/// Data key for an extracted search query
pub const QUERY: &str = "query";

/// Errors building a parser from configuration
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A recognised command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedVoiceCommand {
    /// Id of the matched command pattern
    pub id: String,
    /// Action name
    pub action: String,
    /// The transcript, HTML-escaped
    pub transcript: String,
    /// Match confidence in [0, 1]
    pub confidence: f64,
    /// Extracted values, HTML-escaped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
}

impl ParsedVoiceCommand {
    /// Look up an extracted value
    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key).map(String::as_str)
    }

    fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.action.trim().is_empty()
            && !self.transcript.trim().is_empty()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
    }

    fn sanitized(self) -> Self {
        Self {
            transcript: escape_html(&self.transcript),
            data: self.data.map(|data| {
                data.into_iter()
                    .map(|(key, value)| (key, escape_html(&value)))
                    .collect()
            }),
            ..self
        }
    }
}

/// Voice command parser
#[derive(Debug, Clone)]
pub struct CommandParser {
    registry: CommandRegistry,
    min_confidence: f64,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Parser with the built-in commands
    pub fn new() -> Self {
        Self {
            registry: CommandRegistry::with_defaults(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    /// Parser with only the given commands
    pub fn with_commands(commands: Vec<CommandPattern>) -> Result<Self, RegistryError> {
        let mut registry = CommandRegistry::new();
        for command in commands {
            registry.insert(command)?;
        }
        Ok(Self {
            registry,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        })
    }

    /// Set the minimum similarity the general matcher accepts
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::InvalidConfidence(min_confidence));
        }
        self.min_confidence = min_confidence;
        Ok(self)
    }

    /// Parser with the built-in commands plus the configured custom commands file
    pub fn from_config(config: &ParserConfig) -> Result<Self, ParserError> {
        config.validate()?;
        let mut parser = Self::new().with_min_confidence(config.min_confidence)?;
        if let Some(path) = &config.custom_commands_path {
            parser.load_commands_file(path)?;
        }
        Ok(parser)
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    /// Parse a transcript, returning `None` when no command matches
    pub fn parse(&self, transcript: &str) -> Option<ParsedVoiceCommand> {
        let trimmed = transcript.trim();
        if trimmed.is_empty() {
            return None;
        }

        let text = normalize(trimmed);
        if text.is_empty() {
            return None;
        }

        let candidate = self
            .match_set_grade(trimmed, &text)
            .or_else(|| self.match_general(trimmed, &text))?;

        if !candidate.is_valid() {
            tracing::warn!("Discarding invalid command candidate '{}'", candidate.id);
            return None;
        }

        let command = candidate.sanitized();
        tracing::debug!(
            "Parsed command {} ({}) with confidence {:.2}",
            command.action,
            command.id,
            command.confidence
        );
        Some(command)
    }

    /// Whether the transcript parses to a command
    pub fn is_command(&self, transcript: &str) -> bool {
        self.parse(transcript).is_some()
    }

    fn match_set_grade(&self, transcript: &str, text: &NormalizedText) -> Option<ParsedVoiceCommand> {
        let command = self.registry.find_by_action(actions::SET_GRADE)?;
        let grade = match_set_grade(text)?;

        let data = BTreeMap::from([
            (STUDENT_NAME.to_string(), grade.student_name),
            (GRADE_VALUE.to_string(), grade.grade_value),
        ]);

        Some(ParsedVoiceCommand {
            id: command.id.clone(),
            action: command.action.clone(),
            transcript: transcript.to_string(),
            confidence: SET_GRADE_CONFIDENCE,
            data: Some(data),
        })
    }

    fn match_general(&self, transcript: &str, text: &NormalizedText) -> Option<ParsedVoiceCommand> {
        let (entry, score) = best_match(&self.registry, &text.joined(), self.min_confidence)?;
        let command = &entry.command;

        let phrases = self.registry.phrases_for_action(&command.action);
        let data = if command.action == actions::SEARCH {
            extract_free_text(text, &phrases)
                .map(|query| BTreeMap::from([(QUERY.to_string(), query)]))
        } else if actions::ATTENDANCE.contains(&command.action.as_str())
            || command.action == actions::SET_GRADE
        {
            // A set-grade command reaching here had no usable value; keep the name
            extract_free_text(text, &phrases)
                .map(|name| BTreeMap::from([(STUDENT_NAME.to_string(), name)]))
        } else {
            None
        };

        Some(ParsedVoiceCommand {
            id: command.id.clone(),
            action: command.action.clone(),
            transcript: transcript.to_string(),
            confidence: score.clamp(0.0, 1.0),
            data,
        })
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Add or replace a command
    pub fn add_custom_command(&mut self, command: CommandPattern) -> Result<(), RegistryError> {
        let id = command.id.clone();
        self.registry.insert(command)?;
        tracing::info!(
            "Added custom command '{}', total commands: {}",
            id,
            self.registry.len()
        );
        Ok(())
    }

    /// Remove a command by id
    pub fn remove_command(&mut self, id: &str) -> Option<CommandPattern> {
        let removed = self.registry.remove(id);
        if removed.is_some() {
            tracing::info!(
                "Removed command '{}', remaining: {}",
                id,
                self.registry.len()
            );
        }
        removed
    }

    pub fn get_command_by_id(&self, id: &str) -> Option<&CommandPattern> {
        self.registry.get(id)
    }

    /// All commands in registration order
    pub fn commands(&self) -> Vec<&CommandPattern> {
        self.registry.iter().collect()
    }

    /// Commands for a locale, such as `id-ID`
    pub fn commands_for_language(&self, language: &str) -> Vec<&CommandPattern> {
        self.registry
            .iter()
            .filter(|c| c.matches_language(language))
            .collect()
    }

    /// Import command definitions from JSON; see [`CommandRegistry::import_json`]
    pub fn import_commands(&mut self, json: &str, merge: bool) -> Result<usize, RegistryError> {
        self.registry.import_json(json, merge)
    }

    /// Export all command definitions as JSON
    pub fn export_commands(&self) -> Result<String, RegistryError> {
        self.registry.export_json()
    }

    /// Merge command definitions from a JSON file
    pub fn load_commands_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        self.registry.load_file(path)
    }

    /// Empty the registry; the parser matches nothing afterwards
    pub fn cleanup(&mut self) {
        self.registry.clear();
        tracing::debug!("Command parser cleaned up");
    }
}
