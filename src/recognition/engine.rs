//! Platform speech engine interface
//!
//! The host adapts whatever recognition engine its platform exposes to
//! [`SpeechEngine`]. Engine callbacks (`onstart`, `onresult`, `onerror`, ...)
//! are forwarded to the controller as [`EngineEvent`]s through the
//! [`EngineEventSink`] handed over at construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Settings applied to the engine before each session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

/// Events reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Audio capture started
    Start,
    /// The session ended
    End,
    /// Speech was detected
    SpeechStart,
    /// Speech stopped being detected
    SpeechEnd,
    /// A transcript is available
    Result { transcript: String, is_final: bool },
    /// The engine reported an error
    Error {
        /// Engine error code (`no-speech`, `audio-capture`, `not-allowed`, ...)
        code: String,
        /// Optional engine-provided detail
        message: Option<String>,
    },
}

/// Failure raised synchronously by the engine's start call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Channel through which an engine reports events
#[derive(Clone)]
pub struct EngineEventSink {
    handler: Arc<dyn Fn(EngineEvent) + Send + Sync>,
}

impl EngineEventSink {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Deliver an event
    pub fn emit(&self, event: EngineEvent) {
        (self.handler)(event);
    }
}

impl fmt::Debug for EngineEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEventSink").finish_non_exhaustive()
    }
}

/// Platform speech recognition engine
///
/// Methods take `&self`; engines keep their own interior state. The controller
/// calls them without holding any of its locks, so an engine may emit events
/// synchronously from inside `start`, `stop` or `abort`.
pub trait SpeechEngine: Send + Sync {
    /// Apply language and result settings
    fn configure(&self, settings: &EngineSettings);

    /// Install the event sink; called once by the controller
    fn set_event_sink(&self, sink: EngineEventSink);

    /// Begin a recognition session
    fn start(&self) -> Result<(), EngineError>;

    /// Stop gracefully; a final result may still arrive
    fn stop(&self);

    /// Stop immediately, discarding pending results
    fn abort(&self);
}
