//! Speech error taxonomy
//!
//! Classifies engine error codes and raw failure messages into a small set of
//! kinds, and decides which of them are worth retrying.

use crate::resilience::RetryableError;
use serde::{Deserialize, Serialize};

/// Message shown while the circuit breaker is open
pub const CIRCUIT_OPEN_MESSAGE: &str =
    "Voice recognition is temporarily unavailable. Please try again shortly.";

/// Message shown when no speech engine is available
pub const NOT_SUPPORTED_MESSAGE: &str =
    "Speech recognition is not supported in this browser. Try a recent version of Chrome or Edge.";

/// Kind of a speech error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechErrorKind {
    /// No speech was detected before the engine gave up
    NoSpeech,
    /// The microphone could not be opened or captured
    AudioCapture,
    /// Microphone access was refused
    NotAllowed,
    /// The recognition service could not be reached
    Network,
    /// Recognition was cancelled
    Aborted,
    /// Anything else
    Unknown,
}

impl SpeechErrorKind {
    /// Parse an engine error code (`no-speech`, `not-allowed`, ...)
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "no-speech" => SpeechErrorKind::NoSpeech,
            "audio-capture" => SpeechErrorKind::AudioCapture,
            "not-allowed" | "service-not-allowed" => SpeechErrorKind::NotAllowed,
            "network" => SpeechErrorKind::Network,
            "aborted" => SpeechErrorKind::Aborted,
            _ => SpeechErrorKind::Unknown,
        }
    }

    /// Whether this kind reflects a normal condition rather than a fault
    pub fn is_benign(&self) -> bool {
        matches!(self, SpeechErrorKind::NoSpeech | SpeechErrorKind::Aborted)
    }

    /// Default user-facing message for the kind
    pub fn default_message(&self) -> &'static str {
        match self {
            SpeechErrorKind::NoSpeech => "No speech was detected. Please try speaking again.",
            SpeechErrorKind::AudioCapture => {
                "The microphone could not be accessed. Check that it is connected and not used by another application."
            }
            SpeechErrorKind::NotAllowed => "Microphone access was denied.",
            SpeechErrorKind::Network => {
                "A network error interrupted voice recognition. Check your connection."
            }
            SpeechErrorKind::Aborted => "Voice recognition was cancelled.",
            SpeechErrorKind::Unknown => "Voice recognition failed unexpectedly.",
        }
    }
}

/// A classified speech error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SpeechError {
    pub kind: SpeechErrorKind,
    pub message: String,
}

impl SpeechError {
    pub fn new(kind: SpeechErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error with the kind's default message
    pub fn of_kind(kind: SpeechErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Classify an engine error event
    ///
    /// Known codes win; an unrecognised code falls back to the message text.
    pub fn from_engine_code(code: &str, message: Option<&str>) -> Self {
        let kind = match SpeechErrorKind::from_code(code) {
            SpeechErrorKind::Unknown => message
                .map(classify_message)
                .unwrap_or(SpeechErrorKind::Unknown),
            kind => kind,
        };

        match message.filter(|m| !m.trim().is_empty()) {
            Some(m) if kind == SpeechErrorKind::Unknown => Self::new(kind, m),
            _ => Self::of_kind(kind),
        }
    }

    /// Classify a raw failure message, such as one raised by the engine's start call
    pub fn from_message(message: &str) -> Self {
        Self::new(classify_message(message), message)
    }

    /// Whether the error is a permission problem
    pub fn is_permission_error(&self) -> bool {
        self.kind == SpeechErrorKind::NotAllowed || is_permission_message(&self.message)
    }
}

impl RetryableError for SpeechError {
    fn counts_as_failure(&self) -> bool {
        !self.kind.is_benign() && !self.is_permission_error()
    }
}

fn is_permission_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("permission") || lower.contains("not-allowed") || lower.contains("notallowed")
}

/// Map free-form failure text onto an error kind
pub fn classify_message(message: &str) -> SpeechErrorKind {
    let lower = message.to_lowercase();

    if is_permission_message(&lower) || lower.contains("denied") {
        SpeechErrorKind::NotAllowed
    } else if lower.contains("no-speech") || lower.contains("no speech") {
        SpeechErrorKind::NoSpeech
    } else if lower.contains("network") {
        SpeechErrorKind::Network
    } else if lower.contains("audio-capture")
        || lower.contains("audio capture")
        || lower.contains("microphone")
        || lower.contains("notfounderror")
    {
        SpeechErrorKind::AudioCapture
    } else if lower.contains("abort") {
        SpeechErrorKind::Aborted
    } else {
        SpeechErrorKind::Unknown
    }
}

/// Decide whether a failed engine start should be attempted again
///
/// Permission problems never are. Everything else is retried until
/// `attempt` reaches `max_start_attempts`.
pub fn should_retry_start_error(error: &SpeechError, attempt: u32, max_start_attempts: u32) -> bool {
    if error.is_permission_error() {
        tracing::debug!("Not retrying start: permission error ({})", error.message);
        return false;
    }

    if attempt >= max_start_attempts {
        tracing::debug!(
            "Not retrying start: attempt {} of {} used",
            attempt,
            max_start_attempts
        );
        return false;
    }

    // Network and audio-capture faults are transient; unclassified ones get
    // the same remaining budget
    tracing::debug!(
        "Retrying start after {:?} error (attempt {} of {})",
        error.kind,
        attempt,
        max_start_attempts
    );
    true
}
