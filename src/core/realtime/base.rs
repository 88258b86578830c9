//! Base traits and types for the realtime peer connection.
//!
//! The voice client never touches audio frames or ICE directly. Instead it drives a small set
//! of collaborator traits that a host environment implements:
//!
//! - [`TransportFactory`] / [`RealtimeTransport`] for the peer connection and SDP offer
//! - [`DataChannel`] for the ordered JSON message channel
//! - [`MediaCapture`] / [`MicrophoneStream`] for the local microphone
//!
//! Transport notifications (remote track, channel open/close/error, inbound frames) are
//! delivered through a [`TransportEventCallback`] handed to the factory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised by transport and media collaborators.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Peer connection could not be created or configured
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Offer or answer was rejected
    #[error("Invalid session description: {0}")]
    InvalidDescription(String),

    /// Message channel failure
    #[error("Data channel error: {0}")]
    DataChannel(String),

    /// Microphone permission denied or no input device
    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session
    #[default]
    Idle,
    /// Credential fetch, microphone and SDP exchange in progress
    Connecting,
    /// Message channel open
    Active,
    /// Teardown in progress
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Active => write!(f, "Active"),
            ConnectionState::Closing => write!(f, "Closing"),
        }
    }
}

// =============================================================================
// Transcript Role
// =============================================================================

/// Role of the speaker in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// User speech transcript
    User,
    /// Assistant speech transcript
    Assistant,
}

impl TranscriptRole {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Session Description
// =============================================================================

/// SDP role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// An SDP offer or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

// =============================================================================
// Media Handles
// =============================================================================

/// Opaque handle to the local microphone track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAudioTrack {
    pub id: String,
}

/// Opaque handle to the remote assistant audio stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAudioTrack {
    pub id: String,
}

// =============================================================================
// Transport Events
// =============================================================================

/// Notifications emitted by a live transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Remote audio stream became available
    TrackReceived(RemoteAudioTrack),
    /// Message channel opened
    ChannelOpened,
    /// Inbound text frame on the message channel
    ChannelMessage(String),
    /// Message channel closed by the remote side
    ChannelClosed,
    /// Message channel reported an error
    ChannelError(String),
    /// Remote audio playback reached its end
    RemoteAudioEnded,
}

impl TransportEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::TrackReceived(_) => "track_received",
            TransportEvent::ChannelOpened => "channel_opened",
            TransportEvent::ChannelMessage(_) => "channel_message",
            TransportEvent::ChannelClosed => "channel_closed",
            TransportEvent::ChannelError(_) => "channel_error",
            TransportEvent::RemoteAudioEnded => "remote_audio_ended",
        }
    }
}

/// Callback type for transport events.
///
/// Implementations call this from whatever thread the underlying stack uses; it must not block.
pub type TransportEventCallback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Ordered, reliable text message channel opened on the peer connection.
pub trait DataChannel: Send + Sync {
    /// Whether the channel currently accepts sends.
    fn is_open(&self) -> bool;

    /// Send one text frame.
    fn send_text(&self, text: &str) -> RealtimeResult<()>;

    /// Close the channel. Closing an already closed channel is a no-op.
    fn close(&self) -> RealtimeResult<()>;
}

/// A peer connection to the realtime service.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Attach the local microphone track for sending.
    fn add_audio_track(&mut self, track: LocalAudioTrack) -> RealtimeResult<()>;

    /// Open a message channel with the given label.
    fn create_data_channel(&mut self, label: &str) -> RealtimeResult<Arc<dyn DataChannel>>;

    /// Produce a local SDP offer.
    async fn create_offer(&mut self) -> RealtimeResult<SessionDescription>;

    async fn set_local_description(&mut self, description: SessionDescription)
    -> RealtimeResult<()>;

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> RealtimeResult<()>;

    /// Close the peer connection. Closing twice is a no-op.
    fn close(&mut self) -> RealtimeResult<()>;
}

/// Creates peer connections bound to an event callback.
pub trait TransportFactory: Send + Sync {
    fn create(&self, on_event: TransportEventCallback) -> RealtimeResult<Box<dyn RealtimeTransport>>;
}

/// A granted microphone capture.
pub trait MicrophoneStream: Send + Sync {
    /// The audio track to send, if the capture produced one.
    fn audio_track(&self) -> Option<LocalAudioTrack>;

    /// Stop every track of the capture.
    fn stop_all(&mut self);
}

/// Source of microphone captures.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Request microphone access. Fails with [`RealtimeError::MediaUnavailable`] on denial.
    async fn acquire_microphone(&self) -> RealtimeResult<Box<dyn MicrophoneStream>>;
}
