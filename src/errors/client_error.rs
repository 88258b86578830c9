//! Application-level error type for the voice client.
//!
//! Transport-level failures surface as [`RealtimeError`] from the collaborator traits and are
//! folded into [`ClientError`] here, next to backend HTTP and configuration failures.

use thiserror::Error;

use crate::core::realtime::RealtimeError;

/// Errors produced by session setup, backend calls and configuration loading.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The ephemeral credential request failed
    #[error("Failed to get session: {0}")]
    CredentialFetch(String),

    /// The backend answered without `client_secret.value`
    #[error("No ephemeral key returned from backend")]
    MissingCredential,

    /// Microphone could not be acquired or produced no audio track
    #[error("Microphone unavailable: {0}")]
    Microphone(String),

    /// Peer transport or message channel failure
    #[error("Transport error: {0}")]
    Transport(#[from] RealtimeError),

    /// Offer/answer exchange with the upstream realtime service failed
    #[error("Realtime SDP exchange failed: {0}")]
    Signaling(String),

    /// Non-2xx response; `body` carries the response text
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Request was superseded or the session was torn down
    #[error("Request cancelled")]
    Cancelled,

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No open message channel
    #[error("Not connected")]
    NotConnected,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Whether this error aborts a session start (credential, microphone, transport, signaling).
    pub fn is_fatal_to_start(&self) -> bool {
        matches!(
            self,
            ClientError::CredentialFetch(_)
                | ClientError::MissingCredential
                | ClientError::Microphone(_)
                | ClientError::Transport(_)
                | ClientError::Signaling(_)
        )
    }

    /// Message suitable for the status indicator. Never includes response bodies verbatim
    /// beyond the first line.
    pub fn user_message(&self) -> String {
        let text = self.to_string();
        text.lines().next().unwrap_or_default().to_string()
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ClientError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            ClientError::Serialization(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}
