//! Recognition lifecycle controller
//!
//! Drives a [`SpeechEngine`] through the recognition state machine, governs
//! start attempts with the retry policy and circuit breaker, and surfaces
//! transcripts, errors and lifecycle changes through single-slot callbacks.
//!
//! Runtime failures never come back as `Err`; they are delivered to the
//! `on_error` callback. Locks are released before any host callback runs.

use super::engine::{EngineEvent, EngineEventSink, EngineSettings, SpeechEngine};
use super::error::{
    should_retry_start_error, SpeechError, SpeechErrorKind, CIRCUIT_OPEN_MESSAGE,
    NOT_SUPPORTED_MESSAGE,
};
use super::permission::{
    BrowserFamily, ListenerId, PermissionListener, PermissionQuery, PermissionState,
};
use super::state::{RecognitionEvent, RecognitionState, RecognitionStateMachine, TransitionResult};
use crate::config::{validate_language, ConfigError, RecognitionConfig};
use crate::resilience::{CircuitBreaker, CircuitBreakerState, CircuitError, RetryPolicy};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type ResultCallback = Arc<dyn Fn(&str, bool) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&SpeechError) + Send + Sync>;
type NotifyCallback = Arc<dyn Fn() + Send + Sync>;

/// Host callbacks; each slot holds the latest registration
#[derive(Default)]
struct Callbacks {
    on_result: Option<ResultCallback>,
    on_error: Option<ErrorCallback>,
    on_start: Option<NotifyCallback>,
    on_end: Option<NotifyCallback>,
    on_speech_start: Option<NotifyCallback>,
    on_speech_end: Option<NotifyCallback>,
}

/// Mutable controller state
struct Inner {
    config: RecognitionConfig,
    machine: RecognitionStateMachine,
    permission: PermissionState,
    /// Physical engine start calls made by the current `start_recording`
    start_attempts: u32,
    silence_timer: Option<JoinHandle<()>>,
    /// Bumped whenever the silence timer is armed or cleared
    silence_generation: u64,
    permission_listener: Option<ListenerId>,
    /// Set by abort; results and error transitions are dropped until the next start
    discard_results: bool,
    /// A `start_recording` call is in flight (including retry backoff)
    starting: bool,
    /// Bumped by stop, abort and cleanup; a start that completes after a bump
    /// does not enter Listening
    session_generation: u64,
    cleaned_up: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    engine: Option<Arc<dyn SpeechEngine>>,
    callbacks: Mutex<Callbacks>,
    breaker: CircuitBreaker<SpeechError>,
    permissions: Option<Arc<dyn PermissionQuery>>,
    browser: BrowserFamily,
    runtime: Option<Handle>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(timer) = inner.silence_timer.take() {
            timer.abort();
        }
        if let (Some(id), Some(permissions)) =
            (inner.permission_listener.take(), self.permissions.as_ref())
        {
            permissions.unsubscribe(id);
        }
    }
}

/// Builder for [`RecognitionController`]
pub struct RecognitionControllerBuilder {
    config: RecognitionConfig,
    engine: Option<Arc<dyn SpeechEngine>>,
    permissions: Option<Arc<dyn PermissionQuery>>,
    browser: BrowserFamily,
}

impl RecognitionControllerBuilder {
    /// Speech engine to drive; without one the controller reports "not supported"
    pub fn engine<E: SpeechEngine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Already boxed engine, or `None` when the platform has no engine
    pub fn boxed_engine(mut self, engine: Option<Box<dyn SpeechEngine>>) -> Self {
        self.engine = engine.map(Arc::from);
        self
    }

    /// Permission query collaborator
    pub fn permissions(mut self, permissions: Arc<dyn PermissionQuery>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Browser family used for permission instructions
    pub fn browser(mut self, browser: BrowserFamily) -> Self {
        self.browser = browser;
        self
    }

    /// Detect the browser family from a user-agent string
    pub fn user_agent(self, user_agent: &str) -> Self {
        self.browser(BrowserFamily::from_user_agent(user_agent))
    }

    /// Validate the configuration and build the controller
    ///
    /// Installs the engine event sink and, best-effort, a permission-change
    /// listener.
    pub fn build(self) -> Result<RecognitionController, ConfigError> {
        self.config.validate()?;

        let max_start_attempts = self.config.max_start_attempts;
        let retry = RetryPolicy::with_predicate(self.config.retry, move |e: &SpeechError, attempt| {
            should_retry_start_error(e, attempt, max_start_attempts)
        });
        let breaker = CircuitBreaker::new(self.config.circuit_breaker, retry);

        let supported = self.engine.is_some();
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            tracing::warn!("No tokio runtime available, silence timeout disabled");
        }

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                config: self.config,
                machine: RecognitionStateMachine::new(),
                permission: PermissionState::Unknown,
                start_attempts: 0,
                silence_timer: None,
                silence_generation: 0,
                permission_listener: None,
                discard_results: false,
                starting: false,
                session_generation: 0,
                cleaned_up: false,
            }),
            engine: self.engine,
            callbacks: Mutex::new(Callbacks::default()),
            breaker,
            permissions: self.permissions,
            browser: self.browser,
            runtime,
        });

        let controller = RecognitionController { shared };
        controller.attach_engine();
        controller.watch_permission();

        if supported {
            tracing::info!("Recognition controller ready");
        } else {
            tracing::warn!("Speech recognition is not supported on this platform");
        }

        Ok(controller)
    }
}

/// Recognition lifecycle controller
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct RecognitionController {
    shared: Arc<Shared>,
}

impl RecognitionController {
    /// Start building a controller with the given configuration
    pub fn builder(config: RecognitionConfig) -> RecognitionControllerBuilder {
        RecognitionControllerBuilder {
            config,
            engine: None,
            permissions: None,
            browser: BrowserFamily::default(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current recognition state
    pub fn state(&self) -> RecognitionState {
        self.shared.inner.lock().machine.state()
    }

    /// Whether a session is active
    pub fn is_listening(&self) -> bool {
        self.state() == RecognitionState::Listening
    }

    /// Whether a speech engine was provided
    pub fn is_supported(&self) -> bool {
        self.shared.engine.is_some()
    }

    /// Last known microphone permission state
    pub fn permission_state(&self) -> PermissionState {
        self.shared.inner.lock().permission
    }

    /// Engine start calls made by the most recent `start_recording`
    pub fn start_attempts(&self) -> u32 {
        self.shared.inner.lock().start_attempts
    }

    /// Snapshot of the circuit breaker counters
    pub fn circuit_breaker_state(&self) -> CircuitBreakerState {
        self.shared.breaker.state()
    }

    /// Force the circuit breaker closed
    pub fn reset_circuit_breaker(&self) {
        self.shared.breaker.reset();
    }

    /// Current configuration
    pub fn config(&self) -> RecognitionConfig {
        self.shared.inner.lock().config.clone()
    }

    /// Whether a silence timer is armed and has not fired yet
    pub fn has_pending_silence_timer(&self) -> bool {
        self.shared
            .inner
            .lock()
            .silence_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Whether a permission-change listener is registered
    pub fn has_permission_listener(&self) -> bool {
        self.shared.inner.lock().permission_listener.is_some()
    }

    /// Change the recognition language; applied on the next session
    pub fn set_language(&self, language: &str) -> Result<(), ConfigError> {
        validate_language(language)?;
        self.shared.inner.lock().config.language = language.to_string();
        tracing::info!("Recognition language set to {}", language);
        Ok(())
    }

    // =========================================================================
    // Callback registration
    // =========================================================================

    pub fn set_on_result<F>(&self, callback: F)
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.shared.callbacks.lock().on_result = Some(Arc::new(callback));
    }

    pub fn set_on_error<F>(&self, callback: F)
    where
        F: Fn(&SpeechError) + Send + Sync + 'static,
    {
        self.shared.callbacks.lock().on_error = Some(Arc::new(callback));
    }

    pub fn set_on_start<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.lock().on_start = Some(Arc::new(callback));
    }

    pub fn set_on_end<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.lock().on_end = Some(Arc::new(callback));
    }

    pub fn set_on_speech_start<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.lock().on_speech_start = Some(Arc::new(callback));
    }

    pub fn set_on_speech_end<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.callbacks.lock().on_speech_end = Some(Arc::new(callback));
    }

    // =========================================================================
    // Session control
    // =========================================================================

    /// Start a recognition session
    ///
    /// Resolves once the engine started or every attempt failed. A call while
    /// already listening, or while another start is in flight, is a no-op.
    /// Failures go to `on_error`.
    pub async fn start_recording(&self) {
        let generation = {
            let mut inner = self.shared.inner.lock();
            if inner.cleaned_up {
                tracing::warn!("start_recording called after cleanup, ignoring");
                return;
            }
            if inner.starting {
                tracing::debug!("start_recording ignored: a start is already in progress");
                return;
            }
            if !inner.machine.state().can_start() {
                tracing::debug!("start_recording ignored: already listening");
                return;
            }
            inner.starting = true;
            inner.start_attempts = 0;
            inner.session_generation
        };
        let guard = StartGuard(&self.shared);

        if let Err(error) = self.check_start_preconditions() {
            tracing::warn!("Recognition start rejected: {}", error);
            drop(guard);
            self.emit_error(&error);
            return;
        }

        {
            let mut inner = self.shared.inner.lock();
            inner.discard_results = false;
            inner.machine.process_event(RecognitionEvent::Reset);
        }

        let settings = self.engine_settings();
        let shared = &self.shared;
        let result = shared
            .breaker
            .execute("speech recognition start", || {
                let outcome = shared.try_start_engine(&settings);
                async move { outcome }
            })
            .await;

        let error = {
            let mut inner = shared.inner.lock();
            inner.starting = false;
            match result {
                Ok(()) => {
                    if matches!(
                        inner.permission,
                        PermissionState::Unknown | PermissionState::Prompt
                    ) {
                        inner.permission = PermissionState::Granted;
                    }
                    if inner.session_generation != generation {
                        tracing::debug!("Session stopped while starting, not entering Listening");
                    } else {
                        // No-op when the engine already reported Start
                        inner.machine.process_event(RecognitionEvent::Started);
                    }
                    None
                }
                Err(CircuitError::Open) => Some(SpeechError::new(
                    SpeechErrorKind::Network,
                    CIRCUIT_OPEN_MESSAGE,
                )),
                Err(CircuitError::Operation(error)) => {
                    let error = self.tailor_permission_error(error);
                    if error.is_permission_error() {
                        inner.permission = PermissionState::Denied;
                    }
                    inner.machine.process_event(RecognitionEvent::Failed {
                        error: error.clone(),
                    });
                    Some(error)
                }
            }
        };
        drop(guard);

        if let Some(error) = error {
            self.emit_error(&error);
        }
    }

    /// Stop the session gracefully; a final result may still arrive
    pub fn stop_recording(&self) {
        self.clear_silence_timer();

        // Leave Listening before touching the engine so re-entrant calls from
        // synchronous engine events see Idle
        {
            let mut inner = self.shared.inner.lock();
            if inner.machine.process_event(RecognitionEvent::Stopped).is_none() {
                tracing::debug!("stop_recording ignored: not listening");
                return;
            }
            inner.session_generation += 1;
        }

        if let Some(engine) = &self.shared.engine {
            engine.stop();
        }
    }

    /// Stop the session immediately and discard pending results
    pub fn abort_recording(&self) {
        self.clear_silence_timer();

        {
            let mut inner = self.shared.inner.lock();
            if inner.machine.state() != RecognitionState::Listening {
                tracing::debug!("abort_recording ignored: not listening");
                return;
            }
            inner.discard_results = true;
            inner.session_generation += 1;
            inner.machine.process_event(RecognitionEvent::Aborted);
        }

        if let Some(engine) = &self.shared.engine {
            engine.abort();
        }
    }

    /// Release timers, the engine session, callbacks and the permission listener
    ///
    /// Safe to call more than once. The controller ignores start requests afterwards.
    pub fn cleanup(&self) {
        let (listener, was_listening) = {
            let mut inner = self.shared.inner.lock();
            if inner.cleaned_up {
                tracing::debug!("cleanup already done");
                return;
            }
            inner.cleaned_up = true;
            inner.silence_generation += 1;
            inner.session_generation += 1;
            if let Some(timer) = inner.silence_timer.take() {
                timer.abort();
            }
            let was_listening = inner.machine.state() == RecognitionState::Listening;
            inner.discard_results = true;
            inner.machine.reset();
            (inner.permission_listener.take(), was_listening)
        };

        *self.shared.callbacks.lock() = Callbacks::default();

        if was_listening {
            if let Some(engine) = &self.shared.engine {
                engine.abort();
            }
        }

        if let (Some(id), Some(permissions)) = (listener, self.shared.permissions.as_ref()) {
            permissions.unsubscribe(id);
            tracing::debug!("Permission change listener removed");
        }

        tracing::info!("Recognition controller cleaned up");
    }

    // =========================================================================
    // Engine events
    // =========================================================================

    fn handle_engine_event(&self, event: EngineEvent) {
        tracing::trace!("Engine event: {:?}", event);

        match event {
            EngineEvent::Start => {
                self.transition(RecognitionEvent::Started);
                self.notify(|c| c.on_start.clone());
            }
            EngineEvent::End => {
                self.clear_silence_timer();
                self.transition(RecognitionEvent::Ended);
                self.notify(|c| c.on_end.clone());
            }
            EngineEvent::SpeechStart => {
                self.clear_silence_timer();
                self.notify(|c| c.on_speech_start.clone());
            }
            EngineEvent::SpeechEnd => {
                self.arm_silence_timer();
                self.notify(|c| c.on_speech_end.clone());
            }
            EngineEvent::Result {
                transcript,
                is_final,
            } => self.handle_result(&transcript, is_final),
            EngineEvent::Error { code, message } => {
                self.handle_engine_error(&code, message.as_deref())
            }
        }
    }

    fn handle_result(&self, transcript: &str, is_final: bool) {
        if self.shared.inner.lock().discard_results {
            tracing::debug!("Discarding result after abort");
            return;
        }

        if is_final {
            let breaker = self.shared.breaker.state();
            if breaker.failure_count > 0 || breaker.is_open {
                tracing::info!("Recognition succeeded, resetting circuit breaker");
                self.shared.breaker.reset();
            }
        }

        let callback = self.shared.callbacks.lock().on_result.clone();
        if let Some(callback) = callback {
            callback(transcript, is_final);
        }
    }

    fn handle_engine_error(&self, code: &str, message: Option<&str>) {
        self.clear_silence_timer();

        let error = self.tailor_permission_error(SpeechError::from_engine_code(code, message));

        let aborting = {
            let mut inner = self.shared.inner.lock();
            if error.kind == SpeechErrorKind::NotAllowed {
                inner.permission = PermissionState::Denied;
            }
            inner.discard_results
        };

        if !aborting {
            self.transition(RecognitionEvent::Failed {
                error: error.clone(),
            });
        }

        if error.kind.is_benign() {
            tracing::debug!("Not counting {:?} toward the circuit breaker", error.kind);
        } else {
            self.shared.breaker.record_failure();
        }

        self.emit_error(&error);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn attach_engine(&self) {
        let weak = Arc::downgrade(&self.shared);
        let sink = EngineEventSink::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                RecognitionController { shared }.handle_engine_event(event);
            }
        });

        let settings = self.engine_settings();
        if let Some(engine) = &self.shared.engine {
            engine.configure(&settings);
            engine.set_event_sink(sink);
        }
    }

    /// Query the initial permission state and subscribe to changes, best-effort
    fn watch_permission(&self) {
        let Some(permissions) = self.shared.permissions.clone() else {
            return;
        };

        match permissions.query() {
            Ok(state) => self.shared.inner.lock().permission = state,
            Err(e) => tracing::debug!("Permission query unavailable: {}", e),
        }

        let weak = Arc::downgrade(&self.shared);
        let listener: PermissionListener = Arc::new(move |state| {
            if let Some(shared) = weak.upgrade() {
                let mut inner = shared.inner.lock();
                if inner.permission != state {
                    tracing::info!(
                        "Microphone permission changed: {:?} -> {:?}",
                        inner.permission,
                        state
                    );
                }
                inner.permission = state;
            }
        });

        match permissions.subscribe(listener) {
            Ok(id) => self.shared.inner.lock().permission_listener = Some(id),
            Err(e) => tracing::debug!("Permission change notifications unavailable: {}", e),
        }
    }

    fn check_start_preconditions(&self) -> Result<(), SpeechError> {
        if !self.is_supported() {
            return Err(SpeechError::new(
                SpeechErrorKind::Unknown,
                NOT_SUPPORTED_MESSAGE,
            ));
        }

        if self.shared.breaker.is_open() {
            return Err(SpeechError::new(
                SpeechErrorKind::Network,
                CIRCUIT_OPEN_MESSAGE,
            ));
        }

        if self.permission_state() == PermissionState::Denied {
            return Err(SpeechError::new(
                SpeechErrorKind::NotAllowed,
                self.shared.browser.permission_denied_message(),
            ));
        }

        Ok(())
    }

    fn tailor_permission_error(&self, error: SpeechError) -> SpeechError {
        if error.is_permission_error() {
            SpeechError::new(
                SpeechErrorKind::NotAllowed,
                self.shared.browser.permission_denied_message(),
            )
        } else {
            error
        }
    }

    fn engine_settings(&self) -> EngineSettings {
        let inner = self.shared.inner.lock();
        EngineSettings {
            language: inner.config.language.clone(),
            continuous: inner.config.continuous,
            interim_results: inner.config.interim_results,
            max_alternatives: inner.config.max_alternatives,
        }
    }

    fn transition(&self, event: RecognitionEvent) -> Option<TransitionResult> {
        self.shared.inner.lock().machine.process_event(event)
    }

    fn arm_silence_timer(&self) {
        let Some(runtime) = self.shared.runtime.as_ref() else {
            return;
        };

        let mut inner = self.shared.inner.lock();
        if inner.cleaned_up {
            return;
        }
        inner.silence_generation += 1;
        let generation = inner.silence_generation;
        let timeout = Duration::from_millis(inner.config.silence_timeout_ms);

        let weak = Arc::downgrade(&self.shared);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;

            let Some(shared) = weak.upgrade() else {
                return;
            };
            {
                let mut inner = shared.inner.lock();
                if inner.silence_generation != generation {
                    return;
                }
                inner.silence_timer = None;
            }
            tracing::info!("Silence timeout elapsed, stopping recognition");
            RecognitionController { shared }.stop_recording();
        });

        if let Some(previous) = inner.silence_timer.replace(timer) {
            previous.abort();
        }
    }

    fn clear_silence_timer(&self) {
        let mut inner = self.shared.inner.lock();
        inner.silence_generation += 1;
        if let Some(timer) = inner.silence_timer.take() {
            timer.abort();
            tracing::trace!("Silence timer cleared");
        }
    }

    fn emit_error(&self, error: &SpeechError) {
        tracing::warn!(
            "Speech recognition error ({:?}): {}",
            error.kind,
            error.message
        );
        let callback = self.shared.callbacks.lock().on_error.clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    fn notify(&self, select: impl FnOnce(&Callbacks) -> Option<NotifyCallback>) {
        let callback = select(&self.shared.callbacks.lock());
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Clears the in-flight start flag, also when the start future is dropped
struct StartGuard<'a>(&'a Shared);

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.0.inner.lock().starting = false;
    }
}

impl Shared {
    /// One physical start attempt; no controller lock is held across the engine call
    fn try_start_engine(&self, settings: &EngineSettings) -> Result<(), SpeechError> {
        let attempt = {
            let mut inner = self.inner.lock();
            inner.start_attempts += 1;
            inner.start_attempts
        };
        tracing::debug!("Starting speech engine (attempt {})", attempt);

        let Some(engine) = &self.engine else {
            return Err(SpeechError::new(
                SpeechErrorKind::Unknown,
                NOT_SUPPORTED_MESSAGE,
            ));
        };
        engine.configure(settings);
        engine
            .start()
            .map_err(|e| SpeechError::from_message(&e.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::engine::EngineError;

    #[derive(Default)]
    struct MockState {
        starts: u32,
        stops: u32,
        aborts: u32,
        failures_left: u32,
        failure_message: String,
        settings: Option<EngineSettings>,
        sink: Option<EngineEventSink>,
    }

    #[derive(Clone, Default)]
    struct MockEngine(Arc<Mutex<MockState>>);

    impl MockEngine {
        fn failing(times: u32, message: &str) -> Self {
            let engine = Self::default();
            {
                let mut state = engine.0.lock();
                state.failures_left = times;
                state.failure_message = message.to_string();
            }
            engine
        }

        fn emit(&self, event: EngineEvent) {
            let sink = self.0.lock().sink.clone();
            sink.expect("sink installed").emit(event);
        }
    }

    impl SpeechEngine for MockEngine {
        fn configure(&self, settings: &EngineSettings) {
            self.0.lock().settings = Some(settings.clone());
        }

        fn set_event_sink(&self, sink: EngineEventSink) {
            self.0.lock().sink = Some(sink);
        }

        fn start(&self) -> Result<(), EngineError> {
            let mut state = self.0.lock();
            state.starts += 1;
            if state.failures_left > 0 {
                state.failures_left -= 1;
                return Err(EngineError::new(state.failure_message.clone()));
            }
            Ok(())
        }

        fn stop(&self) {
            self.0.lock().stops += 1;
        }

        fn abort(&self) {
            self.0.lock().aborts += 1;
        }
    }

    fn controller_with(engine: MockEngine) -> RecognitionController {
        RecognitionController::builder(RecognitionConfig::default())
            .engine(engine)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_applies_settings() {
        let engine = MockEngine::default();
        let controller = controller_with(engine.clone());

        controller.start_recording().await;

        let state = engine.0.lock();
        let settings = state.settings.as_ref().unwrap();
        assert_eq!(settings.language, "id-ID");
        assert!(settings.continuous);
        assert_eq!(state.starts, 1);
        drop(state);
        assert!(controller.is_listening());
        assert_eq!(controller.start_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_attempts_counted_per_call() {
        let engine = MockEngine::failing(2, "Network error");
        let controller = controller_with(engine.clone());

        controller.start_recording().await;

        assert_eq!(controller.start_attempts(), 3);
        assert!(controller.is_listening());
        assert_eq!(controller.circuit_breaker_state().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_attempts_reset_on_fresh_call() {
        let engine = MockEngine::failing(3, "Network error");
        let controller = controller_with(engine.clone());

        controller.start_recording().await;
        assert_eq!(controller.state(), RecognitionState::Error);
        assert_eq!(controller.start_attempts(), 3);

        controller.start_recording().await;
        assert_eq!(controller.start_attempts(), 1);
        assert!(controller.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_language_change_applies_to_next_session() {
        let engine = MockEngine::default();
        let controller = controller_with(engine.clone());

        controller.set_language("en-US").unwrap();
        assert!(controller.set_language("xx-XX").is_err());
        controller.start_recording().await;

        assert_eq!(engine.0.lock().settings.as_ref().unwrap().language, "en-US");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_event_fires_callback() {
        let engine = MockEngine::default();
        let controller = controller_with(engine.clone());
        let started = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&started);
        controller.set_on_start(move || *counter.lock() += 1);

        controller.start_recording().await;
        engine.emit(EngineEvent::Start);

        assert_eq!(*started.lock(), 1);
        assert!(controller.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_callback_registration_wins() {
        let engine = MockEngine::default();
        let controller = controller_with(engine.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        controller.set_on_result(move |t, _| first.lock().push(format!("first:{}", t)));
        let second = Arc::clone(&seen);
        controller.set_on_result(move |t, _| second.lock().push(format!("second:{}", t)));

        controller.start_recording().await;
        engine.emit(EngineEvent::Result {
            transcript: "halo".to_string(),
            is_final: true,
        });

        assert_eq!(*seen.lock(), vec!["second:halo".to_string()]);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = RecognitionConfig {
            max_alternatives: 0,
            ..Default::default()
        };
        assert!(RecognitionController::builder(config).build().is_err());
    }

    #[test]
    fn test_builds_without_runtime() {
        let controller = controller_with(MockEngine::default());
        assert!(controller.is_supported());
        assert_eq!(controller.state(), RecognitionState::Idle);
    }
}
