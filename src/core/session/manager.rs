//! Session lifecycle manager.
//!
//! States: `Idle -> Connecting -> Active -> Closing -> Idle`. Start failures route back to
//! `Idle` through the same teardown as a manual stop.

use serde_json::{Map, Value};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use super::ui::{
    ClientUi, ControlState, STATUS_AUTO_STOPPED, STATUS_CHANNEL_CLOSED, STATUS_CHANNEL_ERROR,
    STATUS_CONNECTED, STATUS_CONNECTING, STATUS_CONNECTING_UPSTREAM, STATUS_MANUAL_STOPPED,
    STATUS_PERSIST_THROTTLED, STATUS_PREPARING, STATUS_REQUESTING_MICROPHONE, StatusUpdate,
};
use super::{SessionCommand, SessionHandle, SessionInput, StopReason, generate_session_id};
use crate::config::{ClientConfig, TranscriptPolicy};
use crate::core::backend::{ConversationBackend, RequestSlot};
use crate::core::completion::{CompletionSignal, TeardownTrigger};
use crate::core::events::{EventNormalizer, InboundEvent, is_high_frequency};
use crate::core::function_call::{
    Dispatch, FunctionCallCoordinator, FunctionCallResult, SUMMARY_FUNCTION, SessionAction,
};
use crate::core::persistence::{PersistenceRelay, RelayOutcome, RelayStats};
use crate::core::realtime::{
    ClientEvent, ConnectionState, DataChannel, MediaCapture, MicrophoneStream, RealtimeSignaling,
    RealtimeTransport, TranscriptRole, TransportEvent, TransportEventCallback, TransportFactory,
};
use crate::core::transcript::{FinalizeOutcome, TranscriptBuffer};
use crate::errors::{ClientError, ClientResult};

/// External collaborators of a session manager.
#[derive(Clone)]
pub struct SessionDeps {
    pub backend: Arc<dyn ConversationBackend>,
    pub signaling: Arc<dyn RealtimeSignaling>,
    pub transports: Arc<dyn TransportFactory>,
    pub media: Arc<dyn MediaCapture>,
    pub ui: Arc<dyn ClientUi>,
}

/// Owns one client's session state and processes its inputs in arrival order.
pub struct SessionManager {
    config: ClientConfig,
    deps: SessionDeps,

    coordinator: FunctionCallCoordinator,
    relay: PersistenceRelay,
    normalizer: EventNormalizer,
    transcript: TranscriptBuffer,

    state: ConnectionState,
    session_id: Option<String>,
    generation: u64,
    transport: Option<Box<dyn RealtimeTransport>>,
    channel: Option<Arc<dyn DataChannel>>,
    microphone: Option<Box<dyn MicrophoneStream>>,
    pending_closure: Option<CompletionSignal<TeardownTrigger>>,

    request_slot: Arc<RequestSlot>,
    tasks: TaskTracker,
    /// Cancelled when the loop exits; abandons in-flight background work.
    shutdown: CancellationToken,
    tx: mpsc::UnboundedSender<SessionInput>,
    rx: mpsc::UnboundedReceiver<SessionInput>,
}

impl SessionManager {
    pub fn new(config: ClientConfig, deps: SessionDeps) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let request_slot = Arc::new(RequestSlot::new());
        let handle = SessionHandle::new(tx.clone(), request_slot.clone());

        let coordinator = FunctionCallCoordinator::from_config(deps.backend.clone(), &config);
        let relay = PersistenceRelay::new(deps.backend.clone(), config.persist_cooldown());
        let transcript = TranscriptBuffer::new(&config.assistant_prefix, &config.user_prefix);

        let manager = Self {
            config,
            deps,
            coordinator,
            relay,
            normalizer: EventNormalizer::new(),
            transcript,
            state: ConnectionState::Idle,
            session_id: None,
            generation: 0,
            transport: None,
            channel: None,
            microphone: None,
            pending_closure: None,
            request_slot,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            tx,
            rx,
        };
        (manager, handle)
    }

    // -------------------------------------------------------------------------
    // Loop
    // -------------------------------------------------------------------------

    /// Process inputs until an unload command arrives, then wind down background work.
    ///
    /// Timers and summary requests are abandoned; queued persistence writes are drained.
    pub async fn run(mut self) {
        info!("Session loop started");
        while self.step().await.is_continue() {}

        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.relay.drain().await;
        info!("Session loop finished");
    }

    /// Wait for the next input and handle it.
    pub async fn step(&mut self) -> ControlFlow<()> {
        match self.rx.recv().await {
            Some(input) => self.handle(input).await,
            None => ControlFlow::Break(()),
        }
    }

    /// Handle every input already queued, without waiting for more.
    pub async fn drain_ready(&mut self) -> ControlFlow<()> {
        while let Ok(input) = self.rx.try_recv() {
            if self.handle(input).await.is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub async fn handle(&mut self, input: SessionInput) -> ControlFlow<()> {
        match input {
            SessionInput::Command(SessionCommand::Start) => self.start().await,
            SessionInput::Command(SessionCommand::Stop) => self.stop(StopReason::Manual).await,
            SessionInput::Command(SessionCommand::Unload) => {
                self.stop(StopReason::Unload).await;
                return ControlFlow::Break(());
            }
            SessionInput::Transport { generation, event } => {
                if self.is_current(generation, event.kind()) {
                    self.on_transport_event(event).await;
                }
            }
            SessionInput::RenderFrame { generation } => {
                if self.is_current(generation, "render_frame")
                    && let Some(text) = self.transcript.take_frame()
                {
                    self.deps.ui.render_assistant(&text);
                }
            }
            SessionInput::FunctionCallFinished { generation, result } => {
                if self.is_current(generation, "function_call_finished") {
                    self.apply_result(result).await;
                }
            }
            SessionInput::TeardownDue {
                generation,
                trigger,
            } => {
                if self.is_current(generation, "teardown_due") {
                    info!(trigger = %trigger, "Ending session after summary");
                    self.stop(StopReason::Auto).await;
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn is_current(&self, generation: u64, kind: &str) -> bool {
        if generation == self.generation {
            true
        } else {
            debug!(
                kind = %kind,
                generation,
                current = self.generation,
                "Discarding input from an ended session"
            );
            false
        }
    }

    // -------------------------------------------------------------------------
    // Start
    // -------------------------------------------------------------------------

    /// Open a new session. A no-op while a transport or channel is held.
    pub async fn start(&mut self) {
        if self.transport.is_some() || self.channel.is_some() {
            warn!("Already connected, ignoring start");
            return;
        }

        if self.config.transcript_on_stop == TranscriptPolicy::Reset {
            self.transcript.reset();
            self.deps.ui.clear_transcripts();
        }

        let session_id = generate_session_id();
        info!(session_id = %session_id, "Starting session");
        self.session_id = Some(session_id);
        self.state = ConnectionState::Connecting;
        self.deps.ui.set_controls(ControlState::CONNECTING);
        self.status(StatusUpdate::info(STATUS_CONNECTING));

        match self.establish().await {
            Ok(()) => {
                debug!(session_id = ?self.session_id, "Waiting for message channel");
            }
            Err(ClientError::Cancelled) => {
                info!("Session start cancelled");
                self.stop(StopReason::Failure).await;
            }
            Err(e) => {
                error!(fatal = e.is_fatal_to_start(), "Failed to start session: {}", e);
                self.status(StatusUpdate::error(format!("Error: {}", e.user_message())));
                self.stop(StopReason::Failure).await;
            }
        }
    }

    async fn establish(&mut self) -> ClientResult<()> {
        let credential = self
            .request_slot
            .run(self.deps.backend.fetch_credential())
            .await?;
        self.status(StatusUpdate::info(STATUS_PREPARING));

        let generation = self.generation;
        let tx = self.tx.clone();
        let on_event: TransportEventCallback = Arc::new(move |event: TransportEvent| {
            if tx.send(SessionInput::Transport { generation, event }).is_err() {
                trace!("Session loop gone, dropping transport event");
            }
        });
        self.transport = Some(self.deps.transports.create(on_event)?);

        self.status(StatusUpdate::warning(STATUS_REQUESTING_MICROPHONE));
        let microphone = self
            .deps
            .media
            .acquire_microphone()
            .await
            .map_err(|e| ClientError::Microphone(e.to_string()))?;
        let track = microphone.audio_track();
        self.microphone = Some(microphone);
        let track = track
            .ok_or_else(|| ClientError::Microphone("No audio track available".to_string()))?;

        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        transport.add_audio_track(track)?;
        self.channel = Some(transport.create_data_channel(&self.config.data_channel_label)?);

        let offer = transport.create_offer().await?;
        transport.set_local_description(offer.clone()).await?;

        self.deps.ui.set_status(&StatusUpdate::info(STATUS_CONNECTING_UPSTREAM));
        let answer = self
            .request_slot
            .run(self.deps.signaling.exchange(&credential, &offer))
            .await?;
        transport.set_remote_description(answer).await?;

        info!(session_id = ?self.session_id, "Offer/answer exchange complete");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Stop
    // -------------------------------------------------------------------------

    /// Tear the session down. Close errors are logged and ignored.
    pub async fn stop(&mut self, reason: StopReason) {
        info!(reason = %reason, session_id = ?self.session_id, "Stopping session");
        self.state = ConnectionState::Closing;

        self.request_slot.cancel_inflight();
        if let Some(signal) = self.pending_closure.take() {
            signal.complete(TeardownTrigger::Cancelled);
        }

        if let Some(channel) = self.channel.take()
            && let Err(e) = channel.close()
        {
            debug!("Ignoring channel close error: {}", e);
        }
        if let Some(mut transport) = self.transport.take()
            && let Err(e) = transport.close()
        {
            debug!("Ignoring transport close error: {}", e);
        }
        if let Some(mut microphone) = self.microphone.take() {
            microphone.stop_all();
        }
        self.deps.ui.detach_remote_audio();

        match self.config.transcript_on_stop {
            TranscriptPolicy::Reset => self.transcript.reset(),
            TranscriptPolicy::Preserve => self.transcript.preserve(),
        }
        self.normalizer.reset();
        self.coordinator.reset();

        self.deps.ui.set_controls(ControlState::IDLE);
        match reason {
            StopReason::Auto => self.status(StatusUpdate::warning(STATUS_AUTO_STOPPED)),
            StopReason::Manual | StopReason::Unload => {
                self.status(StatusUpdate::info(STATUS_MANUAL_STOPPED))
            }
            StopReason::Failure => {}
        }

        self.session_id = None;
        self.generation += 1;
        self.state = ConnectionState::Idle;
    }

    // -------------------------------------------------------------------------
    // Transport events
    // -------------------------------------------------------------------------

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::TrackReceived(track) => {
                debug!(track = %track.id, "Remote audio track received");
                self.deps.ui.attach_remote_audio(&track);
            }
            TransportEvent::ChannelOpened => {
                info!(session_id = ?self.session_id, "Message channel open");
                self.state = ConnectionState::Active;
                self.deps.ui.set_controls(ControlState::ACTIVE);
                self.status(StatusUpdate::success(STATUS_CONNECTED));
            }
            TransportEvent::ChannelMessage(frame) => self.on_message(&frame).await,
            TransportEvent::ChannelClosed => {
                info!(session_id = ?self.session_id, "Message channel closed");
                self.status(StatusUpdate::warning(STATUS_CHANNEL_CLOSED));
            }
            TransportEvent::ChannelError(e) => {
                warn!(session_id = ?self.session_id, "Message channel error: {}", e);
                self.status(StatusUpdate::error(STATUS_CHANNEL_ERROR));
            }
            TransportEvent::RemoteAudioEnded => {
                let fired = self
                    .pending_closure
                    .as_ref()
                    .is_some_and(|signal| signal.complete(TeardownTrigger::MediaEnded));
                if fired {
                    info!("Summary playback ended");
                    self.stop(StopReason::Auto).await;
                }
            }
        }
    }

    async fn on_message(&mut self, frame: &str) {
        let event = self.normalizer.normalize_text(frame);
        match &event {
            InboundEvent::Unrecognized { kind } if is_high_frequency(kind) => {}
            InboundEvent::Unrecognized { kind } => trace!(kind = %kind, "Unhandled event"),
            InboundEvent::ResponseDelta { .. } => {}
            other => debug!(event = other.name(), "Inbound event"),
        }

        match event {
            InboundEvent::UserUtteranceFinalized { transcript } => {
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    debug!("Empty user transcript, ignoring");
                    return;
                }
                let line = self.transcript.push_user_line(transcript);
                self.deps.ui.append_user_line(&line);
                self.persist(TranscriptRole::User, transcript);
                self.keyword_summary(transcript).await;
            }
            InboundEvent::FunctionCallInvoked(call) => {
                self.dispatch_function_call(&call.name, &call.arguments, call.call_id.as_deref())
                    .await;
                self.transcript.clear_streaming();
            }
            InboundEvent::ResponseStarted => {
                if self.transcript.start_streaming() {
                    self.schedule_frame();
                }
            }
            InboundEvent::ResponseDelta { accumulated, .. } => {
                let mut frame = false;
                if !self.transcript.is_streaming() {
                    frame |= self.transcript.start_streaming();
                }
                frame |= self.transcript.update_streaming(&accumulated);
                if frame {
                    self.schedule_frame();
                }
            }
            InboundEvent::ResponseDone { transcript } => {
                let Some(transcript) = transcript else {
                    debug!("Empty transcript done, ignoring");
                    self.transcript.clear_streaming();
                    return;
                };
                match self.transcript.finalize(&transcript) {
                    FinalizeOutcome::Committed { line, display } => {
                        self.deps.ui.render_assistant(&display);
                        self.persist(TranscriptRole::Assistant, &line);
                    }
                    FinalizeOutcome::Duplicate { line } => {
                        debug!(line = %line, "Duplicate assistant line skipped");
                    }
                    FinalizeOutcome::Skipped(reason) => {
                        debug!(reason = ?reason, "Assistant finalize skipped");
                    }
                }
            }
            InboundEvent::SessionInfo { kind } => debug!(kind = %kind, "Session event"),
            InboundEvent::Error { message } => {
                error!(session_id = ?self.session_id, "Realtime error: {}", message);
                self.status(StatusUpdate::error(format!("OpenAI error: {message}")));
            }
            InboundEvent::Unrecognized { .. } => {}
        }
    }

    // -------------------------------------------------------------------------
    // Function calls
    // -------------------------------------------------------------------------

    async fn dispatch_function_call(
        &mut self,
        name: &str,
        arguments: &Map<String, Value>,
        call_id: Option<&str>,
    ) {
        let dispatch =
            self.coordinator
                .begin(name, arguments, call_id, self.session_id.as_deref());

        match dispatch {
            Dispatch::Done(result) => self.apply_result(result).await,
            Dispatch::Accepted { request, actions } => {
                self.apply_actions(actions).await;

                let coordinator = self.coordinator.clone();
                let tx = self.tx.clone();
                let generation = self.generation;
                let shutdown = self.shutdown.clone();
                self.tasks.spawn(async move {
                    let result = tokio::select! {
                        result = coordinator.run(request) => result,
                        _ = shutdown.cancelled() => {
                            debug!("Session loop gone, abandoning function call");
                            return;
                        }
                    };
                    if tx
                        .send(SessionInput::FunctionCallFinished { generation, result })
                        .is_err()
                    {
                        trace!("Session loop gone, dropping function result");
                    }
                });
            }
        }
    }

    /// Summary triggered by a phrase in the user's speech, sharing the duplicate guard.
    async fn keyword_summary(&mut self, transcript: &str) {
        if !self.config.keyword_fallback_enabled() {
            return;
        }
        let Some(session_id) = self.session_id.clone() else {
            return;
        };

        let lowered = transcript.to_lowercase();
        let matched = self
            .config
            .summary_keywords
            .iter()
            .any(|keyword| lowered.contains(&keyword.to_lowercase()));
        if matched {
            let call_id = format!("keyword-{session_id}");
            info!(call_id = %call_id, "Summary keyword detected");
            self.dispatch_function_call(SUMMARY_FUNCTION, &Map::new(), Some(&call_id))
                .await;
        }
    }

    async fn apply_result(&mut self, result: FunctionCallResult) {
        info!(
            name = %result.name,
            call_id = ?result.call_id,
            outcome = result.outcome.as_str(),
            "Function call finished"
        );
        self.apply_actions(result.actions).await;
    }

    async fn apply_actions(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::AppendAssistantLine { line, persist } => {
                    let display = self.transcript.append_assistant_line(&line);
                    self.deps.ui.render_assistant(&display);
                    if persist {
                        self.persist(TranscriptRole::Assistant, &line);
                    }
                }
                SessionAction::SetStatus(status) => self.status(status),
                SessionAction::Send(event) => {
                    if let Err(e) = self.send_event(&event) {
                        warn!(event = event.event_type(), "Failed to send event: {}", e);
                    }
                }
                SessionAction::ScheduleTeardown => self.schedule_teardown(),
            }
        }
    }

    /// Send an event on the message channel.
    pub fn send_event(&self, event: &ClientEvent) -> ClientResult<()> {
        let channel = self
            .channel
            .as_ref()
            .filter(|c| c.is_open())
            .ok_or(ClientError::NotConnected)?;
        let text = serde_json::to_string(event)?;
        channel.send_text(&text)?;
        debug!(event = event.event_type(), "Sent event");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    fn schedule_frame(&self) {
        let tx = self.tx.clone();
        let generation = self.generation;
        let frame = self.config.render_frame();
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(frame) => {
                    let _ = tx.send(SessionInput::RenderFrame { generation });
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    fn schedule_teardown(&mut self) {
        if self.pending_closure.is_some() {
            debug!("Teardown already scheduled");
            return;
        }

        let signal = CompletionSignal::new();
        self.pending_closure = Some(signal.clone());

        let tx = self.tx.clone();
        let generation = self.generation;
        let fallback = self.config.summary_teardown_fallback();
        info!(
            fallback_ms = fallback.as_millis() as u64,
            "Session will end after the summary is spoken"
        );
        self.tasks.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(fallback) => {
                    if signal.complete(TeardownTrigger::FallbackTimer) {
                        let _ = tx.send(SessionInput::TeardownDue {
                            generation,
                            trigger: TeardownTrigger::FallbackTimer,
                        });
                    }
                }
                trigger = signal.wait() => {
                    trace!(trigger = %trigger, "Fallback teardown timer released");
                }
            }
        });
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn persist(&self, role: TranscriptRole, content: &str) {
        if self.relay.relay(self.session_id.as_deref(), role, content) == RelayOutcome::Throttled {
            self.status(StatusUpdate::warning(STATUS_PERSIST_THROTTLED));
        }
    }

    fn status(&self, status: StatusUpdate) {
        debug!(kind = %status.kind, message = %status.message, "Status");
        self.deps.ui.set_status(&status);
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn transcript(&self) -> &TranscriptBuffer {
        &self.transcript
    }

    pub fn coordinator(&self) -> &FunctionCallCoordinator {
        &self.coordinator
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.relay.stats()
    }

    /// Whether a teardown is waiting on summary playback.
    pub fn teardown_pending(&self) -> bool {
        self.pending_closure
            .as_ref()
            .is_some_and(|signal| !signal.is_completed())
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Wait for dispatched persistence posts to finish.
    pub async fn flush_persistence(&self) {
        self.relay.drain().await;
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{ConversationMessage, SummaryResponse};
    use crate::core::realtime::{
        LocalAudioTrack, RealtimeError, RealtimeResult, RemoteAudioTrack, SessionDescription,
    };
    use crate::core::session::StatusKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubBackend {
        credential: Option<String>,
        saved: Mutex<Vec<ConversationMessage>>,
    }

    #[async_trait]
    impl ConversationBackend for StubBackend {
        async fn fetch_credential(&self) -> ClientResult<String> {
            self.credential.clone().ok_or(ClientError::MissingCredential)
        }

        async fn save_message(&self, message: &ConversationMessage) -> ClientResult<()> {
            self.saved.lock().push(message.clone());
            Ok(())
        }

        async fn generate_summary(&self, _session_id: &str) -> ClientResult<SummaryResponse> {
            Ok(SummaryResponse::default())
        }
    }

    struct StubSignaling;

    #[async_trait]
    impl RealtimeSignaling for StubSignaling {
        async fn exchange(
            &self,
            _credential: &str,
            _offer: &SessionDescription,
        ) -> ClientResult<SessionDescription> {
            Ok(SessionDescription::answer("v=0 answer"))
        }
    }

    #[derive(Default)]
    struct StubChannel {
        open: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl DataChannel for StubChannel {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send_text(&self, text: &str) -> RealtimeResult<()> {
            self.sent.lock().push(text.to_string());
            Ok(())
        }

        fn close(&self) -> RealtimeResult<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubTransport {
        channel: Arc<StubChannel>,
    }

    #[async_trait]
    impl RealtimeTransport for StubTransport {
        fn add_audio_track(&mut self, _track: LocalAudioTrack) -> RealtimeResult<()> {
            Ok(())
        }

        fn create_data_channel(&mut self, _label: &str) -> RealtimeResult<Arc<dyn DataChannel>> {
            self.channel.open.store(true, Ordering::SeqCst);
            Ok(self.channel.clone())
        }

        async fn create_offer(&mut self) -> RealtimeResult<SessionDescription> {
            Ok(SessionDescription::offer("v=0 offer"))
        }

        async fn set_local_description(
            &mut self,
            _description: SessionDescription,
        ) -> RealtimeResult<()> {
            Ok(())
        }

        async fn set_remote_description(
            &mut self,
            _description: SessionDescription,
        ) -> RealtimeResult<()> {
            Ok(())
        }

        fn close(&mut self) -> RealtimeResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubTransports {
        created: AtomicUsize,
        channel: Arc<StubChannel>,
    }

    impl TransportFactory for StubTransports {
        fn create(
            &self,
            _on_event: TransportEventCallback,
        ) -> RealtimeResult<Box<dyn RealtimeTransport>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubTransport {
                channel: self.channel.clone(),
            }))
        }
    }

    struct StubMicrophone;

    impl MicrophoneStream for StubMicrophone {
        fn audio_track(&self) -> Option<LocalAudioTrack> {
            Some(LocalAudioTrack {
                id: "mic".to_string(),
            })
        }

        fn stop_all(&mut self) {}
    }

    struct StubMedia {
        granted: bool,
    }

    #[async_trait]
    impl MediaCapture for StubMedia {
        async fn acquire_microphone(&self) -> RealtimeResult<Box<dyn MicrophoneStream>> {
            if self.granted {
                Ok(Box::new(StubMicrophone))
            } else {
                Err(RealtimeError::MediaUnavailable("Permission denied".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct StubUi {
        statuses: Mutex<Vec<StatusUpdate>>,
        controls: Mutex<Vec<ControlState>>,
        assistant: Mutex<Vec<String>>,
    }

    impl ClientUi for StubUi {
        fn set_status(&self, status: &StatusUpdate) {
            self.statuses.lock().push(status.clone());
        }

        fn set_controls(&self, controls: ControlState) {
            self.controls.lock().push(controls);
        }

        fn append_user_line(&self, _line: &str) {}

        fn render_assistant(&self, text: &str) {
            self.assistant.lock().push(text.to_string());
        }

        fn clear_transcripts(&self) {}

        fn attach_remote_audio(&self, _track: &RemoteAudioTrack) {}

        fn detach_remote_audio(&self) {}
    }

    struct Fixture {
        manager: SessionManager,
        transports: Arc<StubTransports>,
        ui: Arc<StubUi>,
    }

    fn fixture(credential: Option<&str>, granted: bool) -> Fixture {
        let transports = Arc::new(StubTransports::default());
        let ui = Arc::new(StubUi::default());
        let deps = SessionDeps {
            backend: Arc::new(StubBackend {
                credential: credential.map(str::to_string),
                ..Default::default()
            }),
            signaling: Arc::new(StubSignaling),
            transports: transports.clone(),
            media: Arc::new(StubMedia { granted }),
            ui: ui.clone(),
        };
        let (manager, _handle) = SessionManager::new(ClientConfig::default(), deps);
        Fixture {
            manager,
            transports,
            ui,
        }
    }

    fn channel_message(generation: u64, frame: &str) -> SessionInput {
        SessionInput::Transport {
            generation,
            event: TransportEvent::ChannelMessage(frame.to_string()),
        }
    }

    #[tokio::test]
    async fn test_start_establishes_transport() {
        let mut f = fixture(Some("ek_test"), true);
        f.manager.start().await;

        assert_eq!(f.manager.state(), ConnectionState::Connecting);
        assert!(f.manager.has_transport());
        assert!(f.manager.has_channel());
        assert!(f.manager.session_id().unwrap().starts_with("session_"));
        assert_eq!(
            f.ui.controls.lock().last().copied(),
            Some(ControlState::CONNECTING)
        );
    }

    #[tokio::test]
    async fn test_start_is_ignored_while_connected() {
        let mut f = fixture(Some("ek_test"), true);
        f.manager.start().await;
        let session_id = f.manager.session_id().map(str::to_string);

        f.manager.start().await;

        assert_eq!(f.transports.created.load(Ordering::SeqCst), 1);
        assert_eq!(f.manager.session_id().map(str::to_string), session_id);
    }

    #[tokio::test]
    async fn test_channel_open_activates_session() {
        let mut f = fixture(Some("ek_test"), true);
        f.manager.start().await;
        let generation = f.manager.generation();

        let _ = f
            .manager
            .handle(SessionInput::Transport {
                generation,
                event: TransportEvent::ChannelOpened,
            })
            .await;

        assert_eq!(f.manager.state(), ConnectionState::Active);
        assert_eq!(
            f.ui.controls.lock().last().copied(),
            Some(ControlState::ACTIVE)
        );
        assert_eq!(
            f.ui.statuses.lock().last().map(|s| s.message.clone()),
            Some(crate::core::session::ui::STATUS_CONNECTED.to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_credential_fails_start() {
        let mut f = fixture(None, true);
        f.manager.start().await;

        assert_eq!(f.manager.state(), ConnectionState::Idle);
        assert!(!f.manager.has_transport());
        assert_eq!(f.transports.created.load(Ordering::SeqCst), 0);

        let last = f.ui.statuses.lock().last().cloned().unwrap();
        assert_eq!(last.kind, StatusKind::Error);
        assert!(last.message.starts_with("Error: "));
        assert_eq!(f.ui.controls.lock().last().copied(), Some(ControlState::IDLE));
    }

    #[tokio::test]
    async fn test_microphone_denied_releases_transport() {
        let mut f = fixture(Some("ek_test"), false);
        f.manager.start().await;

        assert_eq!(f.transports.created.load(Ordering::SeqCst), 1);
        assert!(!f.manager.has_transport());
        assert_eq!(f.manager.state(), ConnectionState::Idle);
        let last = f.ui.statuses.lock().last().cloned().unwrap();
        assert_eq!(last.kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn test_stop_bumps_generation_and_fences_old_events() {
        let mut f = fixture(Some("ek_test"), true);
        f.manager.start().await;
        let old = f.manager.generation();

        f.manager.stop(StopReason::Manual).await;
        assert_eq!(f.manager.generation(), old + 1);
        assert!(f.manager.session_id().is_none());

        let frame = r#"{"type":"response.audio_transcript.done","transcript":"Late line"}"#;
        let _ = f.manager.handle(channel_message(old, frame)).await;

        assert!(f.manager.transcript().committed().is_empty());
        assert!(f.ui.assistant.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_done_renders_committed_line() {
        let mut f = fixture(Some("ek_test"), true);
        f.manager.start().await;
        let generation = f.manager.generation();

        let frame = r#"{"type":"response.audio_transcript.done","transcript":"Sure, let me help."}"#;
        let _ = f.manager.handle(channel_message(generation, frame)).await;

        assert_eq!(
            f.ui.assistant.lock().last().cloned(),
            Some("Assistant: Sure, let me help.\n".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_function_sends_nothing() {
        let mut f = fixture(Some("ek_test"), true);
        f.manager.start().await;
        let generation = f.manager.generation();

        let frame = r#"{"type":"response.function_call_arguments.done","name":"launch_rockets","arguments":"{}","call_id":"c1"}"#;
        let _ = f.manager.handle(channel_message(generation, frame)).await;

        assert!(f.transports.channel.sent.lock().is_empty());
        assert!(!f.manager.coordinator().is_in_progress());
    }

    #[tokio::test]
    async fn test_unload_breaks_loop() {
        let mut f = fixture(Some("ek_test"), true);
        let flow = f
            .manager
            .handle(SessionInput::Command(SessionCommand::Unload))
            .await;
        assert!(flow.is_break());
    }
}
