//! Presentation surface driven by the session manager.

use std::fmt;

use crate::core::realtime::RemoteAudioTrack;

/// Visual classification of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

impl StatusKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Info => "info",
            StatusKind::Success => "success",
            StatusKind::Warning => "warning",
            StatusKind::Error => "error",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status indicator update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub kind: StatusKind,
    pub message: String,
}

impl StatusUpdate {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Error, message)
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Enabled state of the start and stop controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl ControlState {
    /// No session: start enabled, stop disabled.
    pub const IDLE: Self = Self {
        start_enabled: true,
        stop_enabled: false,
    };

    /// Start pressed, channel not open yet.
    pub const CONNECTING: Self = Self {
        start_enabled: false,
        stop_enabled: false,
    };

    /// Channel open.
    pub const ACTIVE: Self = Self {
        start_enabled: false,
        stop_enabled: true,
    };
}

// =============================================================================
// Status Texts
// =============================================================================

pub const STATUS_CONNECTING: &str = "Connecting to assistant...";
pub const STATUS_PREPARING: &str = "Preparing voice session...";
pub const STATUS_REQUESTING_MICROPHONE: &str = "Requesting microphone access...";
pub const STATUS_CONNECTING_UPSTREAM: &str = "Connecting to realtime service...";
pub const STATUS_CONNECTED: &str = "Connected! How can I help you today?";
pub const STATUS_READY_AFTER_SUMMARY: &str = "Connected! How can I help you?";
pub const STATUS_GENERATING_SUMMARY: &str = "Generating summary...";
pub const STATUS_READY: &str = "Ready";
pub const STATUS_CHANNEL_CLOSED: &str = "Consultation ended";
pub const STATUS_CHANNEL_ERROR: &str = "Connection error - please try again";
pub const STATUS_AUTO_STOPPED: &str = "Session ended with summary. Click Start to begin again.";
pub const STATUS_MANUAL_STOPPED: &str = "Ready - click Start to begin a new consultation";
pub const STATUS_PERSIST_THROTTLED: &str = "Message not saved: sending too quickly";

/// Host UI the session manager renders into.
///
/// Every method is called from the session loop and must not block.
pub trait ClientUi: Send + Sync {
    fn set_status(&self, status: &StatusUpdate);

    fn set_controls(&self, controls: ControlState);

    /// Append one line to the user transcript area.
    fn append_user_line(&self, line: &str);

    /// Replace the whole assistant transcript area.
    fn render_assistant(&self, text: &str);

    /// Reset both transcript areas to their placeholder.
    fn clear_transcripts(&self);

    /// Route remote audio to playback.
    fn attach_remote_audio(&self, track: &RemoteAudioTrack);

    fn detach_remote_audio(&self);
}
