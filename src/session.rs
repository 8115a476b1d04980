//! Voice command session
//!
//! Wires the complete flow from speech to command:
//! 1. Recognition (final transcripts from the controller)
//! 2. Parsing (shared command parser)
//! 3. Dispatch (host callback with the recognised command)
//!
//! Interim results are ignored; only final transcripts are parsed.

use crate::commands::{CommandParser, ParsedVoiceCommand};
use crate::recognition::RecognitionController;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

type CommandCallback = Arc<dyn Fn(ParsedVoiceCommand) + Send + Sync>;
type UnrecognizedCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct Dispatch {
    parser: Arc<RwLock<CommandParser>>,
    on_command: CommandCallback,
    on_unrecognized: Mutex<Option<UnrecognizedCallback>>,
}

impl Dispatch {
    fn handle(&self, transcript: &str) -> Option<ParsedVoiceCommand> {
        let parsed = self.parser.read().parse(transcript);

        match &parsed {
            Some(command) => {
                tracing::info!(
                    "Voice command recognised: {} (confidence {:.2})",
                    command.action,
                    command.confidence
                );
                (self.on_command)(command.clone());
            }
            None => {
                tracing::debug!("No command matched transcript");
                let callback = self.on_unrecognized.lock().clone();
                if let Some(callback) = callback {
                    callback(transcript);
                }
            }
        }

        parsed
    }
}

/// Connects a recognition controller to a command parser
///
/// Attaching takes over the controller's result callback.
pub struct CommandSession {
    controller: RecognitionController,
    dispatch: Arc<Dispatch>,
}

impl CommandSession {
    /// Route the controller's final transcripts through the parser
    pub fn attach<F>(
        controller: RecognitionController,
        parser: Arc<RwLock<CommandParser>>,
        on_command: F,
    ) -> Self
    where
        F: Fn(ParsedVoiceCommand) + Send + Sync + 'static,
    {
        let dispatch = Arc::new(Dispatch {
            parser,
            on_command: Arc::new(on_command),
            on_unrecognized: Mutex::new(None),
        });

        let handler = Arc::clone(&dispatch);
        controller.set_on_result(move |transcript, is_final| {
            if is_final {
                handler.handle(transcript);
            }
        });

        tracing::debug!("Command session attached");
        Self {
            controller,
            dispatch,
        }
    }

    /// Called with the raw transcript when a final result matches no command
    pub fn set_on_unrecognized<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.dispatch.on_unrecognized.lock() = Some(Arc::new(callback));
    }

    /// Parse and dispatch a transcript as if it were a final result
    pub fn handle_transcript(&self, transcript: &str) -> Option<ParsedVoiceCommand> {
        self.dispatch.handle(transcript)
    }

    pub fn controller(&self) -> &RecognitionController {
        &self.controller
    }

    pub fn parser(&self) -> &Arc<RwLock<CommandParser>> {
        &self.dispatch.parser
    }
}
