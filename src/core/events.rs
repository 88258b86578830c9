//! Classification of inbound realtime frames.
//!
//! [`EventNormalizer`] turns one channel frame into exactly one [`InboundEvent`]. It owns the
//! small amount of cross-frame state the protocol needs: the running assistant transcript
//! accumulator and the `call_id -> name` map learned from `response.output_item.added`.
//!
//! A "function call finished" notification arrives in three envelopes:
//!
//! | type                                    | where the call lives           |
//! |-----------------------------------------|--------------------------------|
//! | `response.function_call_arguments.done` | top level                      |
//! | `response.output_item.done`             | `item` (type `function_call`) or top level |
//! | `conversation.item.created`             | `item` (type `function_call`) or top level |
//!
//! All of them normalize to [`InboundEvent::FunctionCallInvoked`].

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

use crate::core::realtime::openai::messages::{ITEM_TYPE_FUNCTION_CALL, ServerEventType};

/// Which envelope carried a function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEnvelope {
    ArgumentsDone,
    OutputItemDone,
    ItemCreated,
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallInvocation {
    /// Function name; empty when the frame carried none
    pub name: String,
    /// Decoded argument object
    pub arguments: Map<String, Value>,
    pub call_id: Option<String>,
    pub envelope: CallEnvelope,
}

/// Canonical inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Final transcript of one user turn
    UserUtteranceFinalized { transcript: String },
    FunctionCallInvoked(FunctionCallInvocation),
    /// The assistant began a new turn
    ResponseStarted,
    /// Incremental assistant transcript; `accumulated` is the utterance so far
    ResponseDelta { delta: String, accumulated: String },
    /// Assistant turn finished; `None` when there is nothing to commit
    ResponseDone { transcript: Option<String> },
    /// `session.created` / `session.updated`
    SessionInfo { kind: String },
    /// Upstream error event
    Error { message: String },
    /// Anything else
    Unrecognized { kind: String },
}

impl InboundEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::UserUtteranceFinalized { .. } => "user_utterance_finalized",
            InboundEvent::FunctionCallInvoked(_) => "function_call_invoked",
            InboundEvent::ResponseStarted => "response_started",
            InboundEvent::ResponseDelta { .. } => "response_delta",
            InboundEvent::ResponseDone { .. } => "response_done",
            InboundEvent::SessionInfo { .. } => "session_info",
            InboundEvent::Error { .. } => "error",
            InboundEvent::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Stateful frame classifier for one session.
#[derive(Debug, Default)]
pub struct EventNormalizer {
    accumulated: String,
    function_names: HashMap<String, String>,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a text frame. Unparseable JSON is treated as `{}`.
    pub fn normalize_text(&mut self, frame: &str) -> InboundEvent {
        let value = serde_json::from_str::<Value>(frame).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed inbound frame");
            Value::Object(Map::new())
        });
        self.normalize(value)
    }

    /// Classify an already-parsed frame.
    ///
    /// Only `type` decides the event. Every other field is read leniently: a field with an
    /// unexpected JSON type is treated as absent.
    pub fn normalize(&mut self, frame: Value) -> InboundEvent {
        let kind = text_field(&frame, "type").unwrap_or_default();

        match ServerEventType::from_type(&kind) {
            ServerEventType::TranscriptionCompleted => InboundEvent::UserUtteranceFinalized {
                transcript: text_field(&frame, "transcript").unwrap_or_default(),
            },

            ServerEventType::FunctionCallArgumentsDone => {
                let call_id = call_id_of(&frame);
                let name = text_field(&frame, "name")
                    .or_else(|| self.recover_name(call_id.as_deref()));
                self.function_call(
                    name,
                    frame.get("arguments"),
                    call_id,
                    CallEnvelope::ArgumentsDone,
                )
            }

            ServerEventType::OutputItemAdded => {
                if let Some(item) = frame.get("item").filter(|item| is_function_call_item(item))
                    && let (Some(call_id), Some(name)) =
                        (id_field(item, "call_id"), text_field(item, "name"))
                {
                    debug!(call_id = %call_id, name = %name, "Tracking function call");
                    self.function_names.insert(call_id, name);
                }
                InboundEvent::Unrecognized { kind }
            }

            ServerEventType::OutputItemDone => {
                self.item_envelope(kind, &frame, CallEnvelope::OutputItemDone)
            }

            ServerEventType::ConversationItemCreated => {
                self.item_envelope(kind, &frame, CallEnvelope::ItemCreated)
            }

            ServerEventType::ResponseCreated => {
                self.accumulated.clear();
                InboundEvent::ResponseStarted
            }

            ServerEventType::AudioTranscriptDelta => {
                let delta = text_field(&frame, "delta").unwrap_or_default();
                self.accumulated.push_str(&delta);
                InboundEvent::ResponseDelta {
                    delta,
                    accumulated: self.accumulated.clone(),
                }
            }

            ServerEventType::AudioTranscriptDone => {
                let accumulated = std::mem::take(&mut self.accumulated);
                let raw = text_field(&frame, "transcript")
                    .filter(|t| !t.is_empty())
                    .unwrap_or(accumulated);
                let trimmed = raw.trim();
                InboundEvent::ResponseDone {
                    transcript: (!trimmed.is_empty()).then(|| trimmed.to_string()),
                }
            }

            ServerEventType::SessionCreated | ServerEventType::SessionUpdated => {
                InboundEvent::SessionInfo { kind }
            }

            ServerEventType::Error => InboundEvent::Error {
                message: error_message(frame.get("error")),
            },

            ServerEventType::Unknown => {
                trace!(kind = %kind, "Ignoring frame");
                InboundEvent::Unrecognized { kind }
            }
        }
    }

    /// `response.output_item.done` and `conversation.item.created` carry the call either in
    /// `item` or at the top level.
    fn item_envelope(
        &mut self,
        kind: String,
        frame: &Value,
        envelope: CallEnvelope,
    ) -> InboundEvent {
        if let Some(item) = frame.get("item").filter(|item| is_function_call_item(item)) {
            let call_id = id_field(item, "call_id").or_else(|| id_field(item, "id"));
            let name = text_field(item, "name").or_else(|| self.recover_name(call_id.as_deref()));
            return self.function_call(name, item.get("arguments"), call_id, envelope);
        }

        match text_field(frame, "name") {
            Some(name) => {
                self.function_call(Some(name), frame.get("arguments"), call_id_of(frame), envelope)
            }
            None => InboundEvent::Unrecognized { kind },
        }
    }

    fn function_call(
        &mut self,
        name: Option<String>,
        arguments: Option<&Value>,
        call_id: Option<String>,
        envelope: CallEnvelope,
    ) -> InboundEvent {
        if let Some(call_id) = call_id.as_deref() {
            self.function_names.remove(call_id);
        }
        self.accumulated.clear();

        InboundEvent::FunctionCallInvoked(FunctionCallInvocation {
            name: name.unwrap_or_default(),
            arguments: decode_arguments(arguments),
            call_id,
            envelope,
        })
    }

    fn recover_name(&self, call_id: Option<&str>) -> Option<String> {
        call_id.and_then(|id| self.function_names.get(id).cloned())
    }

    /// The assistant utterance accumulated so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Drop all per-session state.
    pub fn reset(&mut self) {
        self.accumulated.clear();
        self.function_names.clear();
    }
}

/// A string field, or `None` when it is absent or not a string.
fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// An identifier field. Numeric ids are accepted and rendered in decimal.
fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn call_id_of(frame: &Value) -> Option<String> {
    id_field(frame, "call_id").or_else(|| id_field(frame, "item_id"))
}

fn is_function_call_item(item: &Value) -> bool {
    item.get("type").and_then(Value::as_str) == Some(ITEM_TYPE_FUNCTION_CALL)
}

/// `error.message` when `error` is an object, the string itself when it is a string.
fn error_message(error: Option<&Value>) -> String {
    let message = match error {
        Some(Value::Object(details)) => details.get("message").and_then(Value::as_str),
        Some(Value::String(message)) => Some(message.as_str()),
        _ => None,
    };
    message
        .filter(|m| !m.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

/// Decode function arguments sent either as a JSON string or as an object.
fn decode_arguments(arguments: Option<&Value>) -> Map<String, Value> {
    match arguments {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(encoded)) if !encoded.trim().is_empty() => {
            match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(map)) => map,
                Ok(_) => Map::new(),
                Err(e) => {
                    warn!(error = %e, "Malformed function arguments");
                    Map::new()
                }
            }
        }
        _ => Map::new(),
    }
}

/// `true` for frame types that are too chatty to log at debug level.
pub fn is_high_frequency(kind: &str) -> bool {
    kind.contains("audio") || kind.contains("delta")
}
