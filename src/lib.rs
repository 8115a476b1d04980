//! classvoice - voice commands for school management
//!
//! Listens through a host-provided speech engine, recovers from transient
//! microphone and network failures, and turns transcripts into structured
//! commands ("mark Budi present", "set grade 85 for Siti").

pub mod commands;
pub mod config;
pub mod recognition;
pub mod resilience;
pub mod session;

pub use commands::{CommandParser, CommandPattern, ParsedVoiceCommand};
pub use config::{ConfigError, VoiceConfig};
pub use recognition::{RecognitionController, RecognitionState, SpeechError, SpeechErrorKind};
pub use session::CommandSession;
