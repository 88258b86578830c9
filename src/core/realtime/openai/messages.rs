//! OpenAI Realtime API message types.
//!
//! Outbound events are strict and serialize exactly the shapes the API expects. Inbound frames
//! are classified by their `type` string alone; payload fields are read from the raw JSON by the
//! event normalizer, so a missing or oddly typed field never hides the event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Item Types
// =============================================================================

/// Conversation item type of a model-issued function call.
pub const ITEM_TYPE_FUNCTION_CALL: &str = "function_call";

/// Conversation item type of a function result injected by the client.
pub const ITEM_TYPE_FUNCTION_CALL_OUTPUT: &str = "function_call_output";

// =============================================================================
// Shared Types
// =============================================================================

/// Conversation item, as sent in `conversation.item.create` and received in item envelopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationItem {
    /// Item ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (`function_call`, `function_call_output`, `message`, ...)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    /// Call ID for function call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name for function call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Function arguments; a JSON string on the wire, occasionally an object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    /// Function output (JSON string) for function call result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// Build a `function_call_output` item carrying a JSON-encoded result.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: Some(ITEM_TYPE_FUNCTION_CALL_OUTPUT.to_string()),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent over the message channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
    },

    /// Request a model response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Short name used in logs.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Inbound server event types the client acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEventType {
    Error,
    SessionCreated,
    SessionUpdated,
    /// Input audio transcription completed
    TranscriptionCompleted,
    FunctionCallArgumentsDone,
    OutputItemAdded,
    OutputItemDone,
    ConversationItemCreated,
    ResponseCreated,
    AudioTranscriptDelta,
    AudioTranscriptDone,
    /// Any other `type`, including a missing one
    Unknown,
}

impl ServerEventType {
    /// Classify a frame by its `type` string.
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "error" => ServerEventType::Error,
            "session.created" => ServerEventType::SessionCreated,
            "session.updated" => ServerEventType::SessionUpdated,
            "conversation.item.input_audio_transcription.completed" => {
                ServerEventType::TranscriptionCompleted
            }
            "response.function_call_arguments.done" => ServerEventType::FunctionCallArgumentsDone,
            "response.output_item.added" => ServerEventType::OutputItemAdded,
            "response.output_item.done" => ServerEventType::OutputItemDone,
            "conversation.item.created" => ServerEventType::ConversationItemCreated,
            "response.created" => ServerEventType::ResponseCreated,
            "response.audio_transcript.delta" => ServerEventType::AudioTranscriptDelta,
            "response.audio_transcript.done" => ServerEventType::AudioTranscriptDone,
            _ => ServerEventType::Unknown,
        }
    }
}
