//! Speech recognition lifecycle
//!
//! Wraps a host-provided speech engine in a state machine, routes engine
//! starts through the retry policy and circuit breaker, and reports
//! transcripts and failures through callbacks.
//!
//! ## States
//!
//! 1. **IDLE** - No session is running
//! 2. **LISTENING** - The engine is capturing audio
//! 3. **ERROR** - The last session or start attempt failed
//!
//! ## State Transitions
//!
//! ```text
//!            start succeeded
//! ┌──────┐ ─────────────────────► ┌───────────┐
//! │ IDLE │                        │ LISTENING │
//! └──────┘ ◄───────────────────── └───────────┘
//!    ▲  │   end / stop / abort          │
//!    │  │                               │ engine error
//!    │  │ all start attempts failed     ▼
//!    │  └──────────────────────────► ┌───────┐
//!    │                               │ ERROR │
//!    └───────────────────────────────└───────┘
//!         fresh start / abort
//! ```
//!
//! ## Preconditions
//!
//! `start_recording` checks, in order: an engine is present, the circuit
//! breaker is closed, and microphone permission is not known to be denied.
//! Each failed check is reported through `on_error` without a state change.
//!
//! ## Silence timeout
//!
//! When the engine reports the end of speech a timer is armed; if no new
//! speech starts before it fires, the session is stopped.

pub mod controller;
pub mod engine;
pub mod error;
pub mod permission;
pub mod state;

pub use controller::{RecognitionController, RecognitionControllerBuilder};
pub use engine::{EngineError, EngineEvent, EngineEventSink, EngineSettings, SpeechEngine};
pub use error::{should_retry_start_error, SpeechError, SpeechErrorKind};
pub use permission::{
    BrowserFamily, ListenerId, PermissionError, PermissionListener, PermissionQuery,
    PermissionState,
};
pub use state::{RecognitionEvent, RecognitionState, RecognitionStateMachine, TransitionReason};
