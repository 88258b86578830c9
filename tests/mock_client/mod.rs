//! In-memory collaborators for session tests.
//!
//! - `MockTransports` / `MockTransport`: peer connection factory that captures the event
//!   callback so tests can inject transport events
//! - `MockChannel`: records every frame sent on the message channel
//! - `MockMedia`: microphone capture that can be granted or denied
//! - `RecordingUi`: records every call made on the UI surface

// Not every test binary uses every helper
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use waav_voice_client::core::realtime::{LocalAudioTrack, RemoteAudioTrack, SessionDescription};
use waav_voice_client::{
    ClientUi, ControlState, DataChannel, MediaCapture, MicrophoneStream, RealtimeError,
    RealtimeResult, RealtimeTransport, StatusKind, StatusUpdate, TransportEvent,
    TransportEventCallback, TransportFactory,
};

// =============================================================================
// Message channel
// =============================================================================

#[derive(Default)]
pub struct MockChannel {
    open: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl MockChannel {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Sent frames parsed as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|s| serde_json::from_str(s).expect("sent frame is JSON"))
            .collect()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DataChannel for MockChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: &str) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::DataChannel("Channel not open".to_string()));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn close(&self) -> RealtimeResult<()> {
        self.open.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Transport
// =============================================================================

pub struct MockTransport {
    channel: Arc<MockChannel>,
    closed: Arc<AtomicBool>,
    remote: Arc<Mutex<Option<SessionDescription>>>,
}

#[async_trait]
impl RealtimeTransport for MockTransport {
    fn add_audio_track(&mut self, _track: LocalAudioTrack) -> RealtimeResult<()> {
        Ok(())
    }

    fn create_data_channel(&mut self, _label: &str) -> RealtimeResult<Arc<dyn DataChannel>> {
        self.channel.open.store(true, Ordering::SeqCst);
        Ok(self.channel.clone())
    }

    async fn create_offer(&mut self) -> RealtimeResult<SessionDescription> {
        Ok(SessionDescription::offer("v=0\r\no=- offer\r\n"))
    }

    async fn set_local_description(
        &mut self,
        _description: SessionDescription,
    ) -> RealtimeResult<()> {
        Ok(())
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> RealtimeResult<()> {
        *self.remote.lock() = Some(description);
        Ok(())
    }

    fn close(&mut self) -> RealtimeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out transports that share one channel; keeps the latest event callback.
#[derive(Default)]
pub struct MockTransports {
    created: AtomicUsize,
    pub channel: Arc<MockChannel>,
    pub transport_closed: Arc<AtomicBool>,
    pub remote: Arc<Mutex<Option<SessionDescription>>>,
    callback: Mutex<Option<TransportEventCallback>>,
}

impl MockTransports {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Deliver a transport event through the captured callback.
    pub fn emit(&self, event: TransportEvent) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    /// Callback captured from the most recent transport.
    pub fn callback(&self) -> Option<TransportEventCallback> {
        self.callback.lock().clone()
    }

    pub fn message(&self, frame: Value) {
        self.emit(TransportEvent::ChannelMessage(frame.to_string()));
    }
}

impl TransportFactory for MockTransports {
    fn create(&self, on_event: TransportEventCallback) -> RealtimeResult<Box<dyn RealtimeTransport>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.callback.lock() = Some(on_event);
        Ok(Box::new(MockTransport {
            channel: self.channel.clone(),
            closed: self.transport_closed.clone(),
            remote: self.remote.clone(),
        }))
    }
}

// =============================================================================
// Microphone
// =============================================================================

pub struct MockMicrophone {
    stopped: Arc<AtomicBool>,
}

impl MicrophoneStream for MockMicrophone {
    fn audio_track(&self) -> Option<LocalAudioTrack> {
        Some(LocalAudioTrack {
            id: "mic-0".to_string(),
        })
    }

    fn stop_all(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

pub struct MockMedia {
    granted: bool,
    pub stopped: Arc<AtomicBool>,
}

impl MockMedia {
    pub fn granted() -> Self {
        Self {
            granted: true,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl MediaCapture for MockMedia {
    async fn acquire_microphone(&self) -> RealtimeResult<Box<dyn MicrophoneStream>> {
        if !self.granted {
            return Err(RealtimeError::MediaUnavailable(
                "Permission denied".to_string(),
            ));
        }
        Ok(Box::new(MockMicrophone {
            stopped: self.stopped.clone(),
        }))
    }
}

// =============================================================================
// UI
// =============================================================================

#[derive(Default)]
pub struct RecordingUi {
    pub statuses: Mutex<Vec<StatusUpdate>>,
    pub controls: Mutex<Vec<ControlState>>,
    pub user_lines: Mutex<Vec<String>>,
    pub assistant_renders: Mutex<Vec<String>>,
    pub clears: AtomicUsize,
    pub audio_attached: AtomicBool,
}

impl RecordingUi {
    pub fn last_status(&self) -> Option<StatusUpdate> {
        self.statuses.lock().last().cloned()
    }

    pub fn has_status(&self, kind: StatusKind, message: &str) -> bool {
        self.statuses
            .lock()
            .iter()
            .any(|s| s.kind == kind && s.message == message)
    }

    pub fn last_controls(&self) -> Option<ControlState> {
        self.controls.lock().last().copied()
    }

    pub fn last_assistant(&self) -> Option<String> {
        self.assistant_renders.lock().last().cloned()
    }

    pub fn user_lines(&self) -> Vec<String> {
        self.user_lines.lock().clone()
    }
}

impl ClientUi for RecordingUi {
    fn set_status(&self, status: &StatusUpdate) {
        self.statuses.lock().push(status.clone());
    }

    fn set_controls(&self, controls: ControlState) {
        self.controls.lock().push(controls);
    }

    fn append_user_line(&self, line: &str) {
        self.user_lines.lock().push(line.to_string());
    }

    fn render_assistant(&self, text: &str) {
        self.assistant_renders.lock().push(text.to_string());
    }

    fn clear_transcripts(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn attach_remote_audio(&self, _track: &RemoteAudioTrack) {
        self.audio_attached.store(true, Ordering::SeqCst);
    }

    fn detach_remote_audio(&self) {
        self.audio_attached.store(false, Ordering::SeqCst);
    }
}
