//! Realtime peer-connection abstractions.
//!
//! # Architecture
//!
//! - `base` defines the collaborator traits a host implements (transport, data channel,
//!   microphone) and the shared types flowing through them
//! - `openai` speaks the OpenAI Realtime API: SDP exchange and event vocabulary
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_voice_client::core::realtime::{TransportEvent, TransportFactory};
//! use std::sync::Arc;
//!
//! let transport = factory.create(Arc::new(|event: TransportEvent| {
//!     tracing::debug!(kind = event.kind(), "transport event");
//! }))?;
//! ```

mod base;
pub mod openai;

pub use base::{
    ConnectionState, DataChannel, LocalAudioTrack, MediaCapture, MicrophoneStream,
    RealtimeError, RealtimeResult, RealtimeTransport, RemoteAudioTrack, SdpType,
    SessionDescription, TranscriptRole, TransportEvent, TransportEventCallback, TransportFactory,
};
pub use openai::{
    ClientEvent, DEFAULT_DATA_CHANNEL_LABEL, OPENAI_REALTIME_URL, OpenAIRealtimeModel,
    OpenAISignaling, RealtimeSignaling,
};
