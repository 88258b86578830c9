//! OpenAI Realtime API module.
//!
//! Covers the parts of the WebRTC flavour of the API that the voice client speaks directly:
//!
//! - SDP offer/answer exchange over HTTPS with an ephemeral credential
//! - The JSON event vocabulary carried on the `oai-events` data channel
//!
//! # Supported Models
//!
//! - `gpt-4o-realtime-preview` - GPT-4o Realtime Preview
//! - `gpt-4o-realtime-preview-2024-10-01` - October 2024 version
//! - `gpt-4o-realtime-preview-2024-12-17` - December 2024 version (default)
//! - `gpt-4o-mini-realtime-preview` - Mini model for lower latency
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_voice_client::core::realtime::openai::{OpenAISignaling, RealtimeSignaling};
//!
//! let signaling = OpenAISignaling::default();
//! let answer = signaling.exchange(&ephemeral_key, &offer).await?;
//! transport.set_remote_description(answer).await?;
//! ```

mod config;
pub mod messages;
mod signaling;

pub use config::{
    DEFAULT_DATA_CHANNEL_LABEL, OPENAI_REALTIME_URL, OpenAIRealtimeModel, SDP_CONTENT_TYPE,
};
pub use messages::{ClientEvent, ConversationItem, ServerEventType};
pub use signaling::{OpenAISignaling, RealtimeSignaling};
