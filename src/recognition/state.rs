//! Recognition lifecycle state machine
//!
//! Defines the states and transitions of a recognition session. The controller
//! feeds it events and acts on the transitions it reports.

use super::error::SpeechError;
use serde::{Deserialize, Serialize};

/// Recognition state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionState {
    /// No session is running
    #[default]
    Idle,
    /// The engine is capturing audio
    Listening,
    /// The last attempt ended abnormally; a new start is allowed
    Error,
}

impl RecognitionState {
    /// Returns a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            RecognitionState::Idle => "Not listening",
            RecognitionState::Listening => "Listening for speech",
            RecognitionState::Error => "Recognition error",
        }
    }

    /// Returns whether `start_recording` may begin a session from this state
    pub fn can_start(&self) -> bool {
        !matches!(self, RecognitionState::Listening)
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// The engine started capturing
    Started,
    /// The engine finished the session
    Ended,
    /// The host asked to stop
    Stopped,
    /// The host asked to abort
    Aborted,
    /// The session or the start attempt failed
    Failed { error: SpeechError },
    /// A fresh start clears a previous error
    Reset,
}

/// Reason for entering a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// The engine reported that capture began
    EngineStarted,
    /// The engine ended the session
    EngineEnded,
    /// The host stopped recognition
    UserStop,
    /// The host aborted recognition
    UserAbort,
    /// An error ended the session
    Error { message: String },
    /// A fresh start cleared the error state
    Restart,
}

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct TransitionResult {
    /// State before the transition
    pub previous_state: RecognitionState,
    /// The new state after the transition
    pub new_state: RecognitionState,
    /// Reason for the transition
    pub reason: TransitionReason,
}

/// Recognition state machine
pub struct RecognitionStateMachine {
    state: RecognitionState,
    last_error: Option<SpeechError>,
}

impl RecognitionStateMachine {
    /// Creates a new state machine in the Idle state
    pub fn new() -> Self {
        Self {
            state: RecognitionState::Idle,
            last_error: None,
        }
    }

    /// Returns the current state
    pub fn state(&self) -> RecognitionState {
        self.state
    }

    /// The error that put the machine into the Error state, if any
    pub fn last_error(&self) -> Option<&SpeechError> {
        self.last_error.as_ref()
    }

    /// Process an event and return the transition result if a transition occurred
    ///
    /// Returns `None` if the event does not apply to the current state.
    pub fn process_event(&mut self, event: RecognitionEvent) -> Option<TransitionResult> {
        use RecognitionState::{Error, Idle, Listening};

        let (new_state, reason) = match (self.state, event) {
            (Idle | Error, RecognitionEvent::Started) => (Listening, TransitionReason::EngineStarted),

            (Listening, RecognitionEvent::Ended) => (Idle, TransitionReason::EngineEnded),
            (Listening, RecognitionEvent::Stopped) => (Idle, TransitionReason::UserStop),

            (Listening | Error, RecognitionEvent::Aborted) => (Idle, TransitionReason::UserAbort),

            (_, RecognitionEvent::Failed { error }) => {
                let reason = TransitionReason::Error {
                    message: error.message.clone(),
                };
                self.last_error = Some(error);
                (Error, reason)
            }

            (Error, RecognitionEvent::Reset) => (Idle, TransitionReason::Restart),

            // Invalid transitions
            _ => return None,
        };

        let result = TransitionResult {
            previous_state: self.state,
            new_state,
            reason,
        };
        self.apply_transition(&result);
        Some(result)
    }

    /// Apply a transition, updating internal state
    fn apply_transition(&mut self, result: &TransitionResult) {
        self.state = result.new_state;

        if result.new_state != RecognitionState::Error {
            self.last_error = None;
        }

        tracing::info!(
            "Recognition state transition: {:?} -> {:?} (reason: {:?})",
            result.previous_state,
            result.new_state,
            result.reason
        );
    }

    /// Reset the state machine to Idle
    pub fn reset(&mut self) {
        self.state = RecognitionState::Idle;
        self.last_error = None;
        tracing::debug!("Recognition state machine reset to Idle");
    }
}

impl Default for RecognitionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::error::SpeechErrorKind;

    fn network_failure() -> RecognitionEvent {
        RecognitionEvent::Failed {
            error: SpeechError::of_kind(SpeechErrorKind::Network),
        }
    }

    #[test]
    fn test_initial_state_is_idle() {
        let sm = RecognitionStateMachine::new();
        assert_eq!(sm.state(), RecognitionState::Idle);
    }

    #[test]
    fn test_started_transitions_to_listening() {
        let mut sm = RecognitionStateMachine::new();
        let result = sm.process_event(RecognitionEvent::Started);

        assert!(result.is_some());
        let result = result.unwrap();
        assert_eq!(result.previous_state, RecognitionState::Idle);
        assert_eq!(result.new_state, RecognitionState::Listening);
        assert_eq!(sm.state(), RecognitionState::Listening);
    }

    #[test]
    fn test_started_while_listening_is_ignored() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(RecognitionEvent::Started);
        assert!(sm.process_event(RecognitionEvent::Started).is_none());
    }

    #[test]
    fn test_ended_returns_to_idle() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(RecognitionEvent::Started);
        let result = sm.process_event(RecognitionEvent::Ended).unwrap();
        assert_eq!(result.new_state, RecognitionState::Idle);
        assert_eq!(result.reason, TransitionReason::EngineEnded);
    }

    #[test]
    fn test_stopped_returns_to_idle() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(RecognitionEvent::Started);
        let result = sm.process_event(RecognitionEvent::Stopped).unwrap();
        assert_eq!(result.reason, TransitionReason::UserStop);
        assert_eq!(sm.state(), RecognitionState::Idle);
    }

    #[test]
    fn test_stop_when_idle_is_ignored() {
        let mut sm = RecognitionStateMachine::new();
        assert!(sm.process_event(RecognitionEvent::Stopped).is_none());
        assert!(sm.process_event(RecognitionEvent::Aborted).is_none());
    }

    #[test]
    fn test_failure_while_listening_enters_error() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(RecognitionEvent::Started);
        let result = sm.process_event(network_failure()).unwrap();

        assert_eq!(result.new_state, RecognitionState::Error);
        assert!(matches!(result.reason, TransitionReason::Error { .. }));
        assert_eq!(sm.last_error().unwrap().kind, SpeechErrorKind::Network);
    }

    #[test]
    fn test_end_after_error_keeps_error() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(RecognitionEvent::Started);
        sm.process_event(network_failure());
        assert!(sm.process_event(RecognitionEvent::Ended).is_none());
        assert_eq!(sm.state(), RecognitionState::Error);
    }

    #[test]
    fn test_reset_event_clears_error() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(network_failure());
        let result = sm.process_event(RecognitionEvent::Reset).unwrap();

        assert_eq!(result.new_state, RecognitionState::Idle);
        assert_eq!(result.reason, TransitionReason::Restart);
        assert!(sm.last_error().is_none());
    }

    #[test]
    fn test_restart_from_error() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(network_failure());
        let result = sm.process_event(RecognitionEvent::Started).unwrap();
        assert_eq!(result.new_state, RecognitionState::Listening);
    }

    #[test]
    fn test_abort_from_error_returns_to_idle() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(network_failure());
        let result = sm.process_event(RecognitionEvent::Aborted).unwrap();
        assert_eq!(result.new_state, RecognitionState::Idle);
    }

    #[test]
    fn test_state_descriptions() {
        assert_eq!(RecognitionState::Idle.description(), "Not listening");
        assert_eq!(
            RecognitionState::Listening.description(),
            "Listening for speech"
        );
        assert_eq!(RecognitionState::Error.description(), "Recognition error");
    }

    #[test]
    fn test_can_start() {
        assert!(RecognitionState::Idle.can_start());
        assert!(!RecognitionState::Listening.can_start());
        assert!(RecognitionState::Error.can_start());
    }

    #[test]
    fn test_reset() {
        let mut sm = RecognitionStateMachine::new();
        sm.process_event(RecognitionEvent::Started);
        sm.reset();
        assert_eq!(sm.state(), RecognitionState::Idle);
    }
}
