//! Configuration management for classvoice
//!
//! Provides the recognition and parser settings with schema versioning and
//! migrations. Configuration is stored as JSON, by default at
//! `~/.classvoice/config.json`, and validated before anything is built from it.

use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config schema version
pub const CURRENT_VERSION: u32 = 1;

/// Locale tags the speech engine is configured with
pub const SUPPORTED_LANGUAGES: &[&str] = &["id-ID", "en-US", "en-GB"];

/// Upper bound for the silence timeout in milliseconds
const MAX_SILENCE_TIMEOUT_MS: u64 = 60_000;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported language '{0}', expected one of: id-ID, en-US, en-GB")]
    UnsupportedLanguage(String),

    #[error("max_alternatives must be between 1 and 10, got {0}")]
    InvalidMaxAlternatives(u32),

    #[error("Silence timeout must be between 1 and 60000 ms, got {0}")]
    InvalidSilenceTimeout(u64),

    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },

    #[error("Minimum confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),

    #[error("Unknown config version: {0}")]
    UnknownVersion(u32),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Schema version for migrations
    pub version: u32,
    /// Speech recognition settings
    pub recognition: RecognitionConfig,
    /// Command parser settings
    pub parser: ParserConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            recognition: RecognitionConfig::default(),
            parser: ParserConfig::default(),
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Locale tag handed to the speech engine (see [`SUPPORTED_LANGUAGES`])
    pub language: String,
    /// Keep listening after the first final result
    pub continuous: bool,
    /// Deliver interim (non-final) results
    pub interim_results: bool,
    /// Number of alternatives requested from the engine (1-10)
    pub max_alternatives: u32,
    /// Silence after end of speech before listening stops (ms)
    pub silence_timeout_ms: u64,
    /// Physical start attempts allowed per `start_recording` call
    pub max_start_attempts: u32,
    /// Backoff between start attempts
    pub retry: RetryConfig,
    /// Failure accounting across start attempts and engine errors
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "id-ID".to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
            silence_timeout_ms: 3000,
            max_start_attempts: 3,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RecognitionConfig {
    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_language(&self.language)?;

        if !(1..=10).contains(&self.max_alternatives) {
            return Err(ConfigError::InvalidMaxAlternatives(self.max_alternatives));
        }
        if self.silence_timeout_ms == 0 || self.silence_timeout_ms > MAX_SILENCE_TIMEOUT_MS {
            return Err(ConfigError::InvalidSilenceTimeout(self.silence_timeout_ms));
        }
        if self.max_start_attempts == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_start_attempts",
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "retry.max_attempts",
            });
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "circuit_breaker.failure_threshold",
            });
        }
        Ok(())
    }
}

/// Check a locale tag against [`SUPPORTED_LANGUAGES`]
pub fn validate_language(language: &str) -> Result<(), ConfigError> {
    if SUPPORTED_LANGUAGES.contains(&language) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedLanguage(language.to_string()))
    }
}

/// Command parser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Similarity a pattern must reach to be accepted
    pub min_confidence: f64,
    /// Optional JSON file with extra command definitions
    pub custom_commands_path: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            custom_commands_path: None,
        }
    }
}

impl ParserConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidConfidence(self.min_confidence));
        }
        Ok(())
    }
}

impl VoiceConfig {
    /// Validate all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.recognition.validate()?;
        self.parser.validate()
    }

    /// Load configuration from a file, falling back to defaults if it is missing
    ///
    /// Older schema versions are migrated in memory; the result is validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: VoiceConfig = serde_json::from_str(&contents)?;
        let migrated = migrate_config(config)?;
        migrated.validate()?;

        tracing::info!(
            "Config loaded from {:?} (language: {})",
            path,
            migrated.recognition.language
        );
        Ok(migrated)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;

        tracing::debug!("Config saved to {:?}", path);
        Ok(())
    }
}

/// Get the path to the config file (~/.classvoice/config.json)
pub fn default_config_path() -> PathBuf {
    home_dir_or_fallback().join(".classvoice").join("config.json")
}

/// Get the home directory, falling back to the working directory if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: VoiceConfig) -> Result<VoiceConfig, ConfigError> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version > CURRENT_VERSION {
        return Err(ConfigError::UnknownVersion(config.version));
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: VoiceConfig) -> Result<VoiceConfig, ConfigError> {
    match config.version {
        // Version 0 files predate the locale list; bare "id"/"en" tags were accepted
        0 => {
            let mut migrated = config;
            migrated.recognition.language = match migrated.recognition.language.as_str() {
                "id" => "id-ID".to_string(),
                "en" => "en-US".to_string(),
                other => other.to_string(),
            };
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(ConfigError::UnknownVersion(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_current_version() {
        let config = VoiceConfig::default();
        assert_eq!(config.version, CURRENT_VERSION);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(VoiceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_recognition_config_defaults() {
        let recognition = RecognitionConfig::default();
        assert_eq!(recognition.language, "id-ID");
        assert!(recognition.continuous);
        assert!(recognition.interim_results);
        assert_eq!(recognition.max_alternatives, 1);
        assert_eq!(recognition.max_start_attempts, 3);
    }

    #[test]
    fn test_parser_config_defaults() {
        let parser = ParserConfig::default();
        assert_eq!(parser.min_confidence, 0.7);
        assert!(parser.custom_commands_path.is_none());
    }

    #[test]
    fn test_unsupported_language_rejected() {
        let config = RecognitionConfig {
            language: "fr-FR".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedLanguage(lang)) if lang == "fr-FR"
        ));
    }

    #[test]
    fn test_max_alternatives_bounds() {
        for (value, ok) in [(0, false), (1, true), (10, true), (11, false)] {
            let config = RecognitionConfig {
                max_alternatives: value,
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "max_alternatives={}", value);
        }
    }

    #[test]
    fn test_zero_silence_timeout_rejected() {
        let config = RecognitionConfig {
            silence_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSilenceTimeout(0))
        ));
    }

    #[test]
    fn test_zero_failure_threshold_rejected() {
        let mut config = RecognitionConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "circuit_breaker.failure_threshold must be at least 1"
        );
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let parser = ParserConfig {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(parser.validate().is_err());
    }

    #[test]
    fn test_partial_config_deserialisation() {
        let json = r#"{"version": 1, "recognition": {"language": "en-US"}}"#;
        let config: VoiceConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.recognition.language, "en-US");
        assert_eq!(config.recognition.max_alternatives, 1);
        assert_eq!(config.parser.min_confidence, 0.7);
    }

    #[test]
    fn test_migration_from_version_0() {
        let mut old = VoiceConfig {
            version: 0,
            ..Default::default()
        };
        old.recognition.language = "en".to_string();

        let migrated = migrate_config(old).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
        assert_eq!(migrated.recognition.language, "en-US");
    }

    #[test]
    fn test_future_version_rejected() {
        let future = VoiceConfig {
            version: 999,
            ..Default::default()
        };
        assert!(matches!(
            migrate_config(future),
            Err(ConfigError::UnknownVersion(999))
        ));
    }

    #[test]
    fn test_config_path_format() {
        let path = default_config_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains(".classvoice"));
        assert!(path_str.ends_with("config.json"));
    }
}
