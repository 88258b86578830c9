//! Backend HTTP contract.
//!
//! Three endpoints are consumed:
//!
//! - `GET /api/session` issues an ephemeral credential for the upstream realtime service
//! - `POST /api/conversation` stores one transcript line
//! - `POST /api/generate-summary` produces a summary of everything stored for a session
//!
//! [`ConversationBackend`] is the seam the rest of the crate depends on; [`HttpBackend`] is the
//! reqwest implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::core::realtime::TranscriptRole;
use crate::errors::{ClientError, ClientResult};

pub const SESSION_PATH: &str = "/api/session";
pub const CONVERSATION_PATH: &str = "/api/conversation";
pub const SUMMARY_PATH: &str = "/api/generate-summary";

/// Backend marker for a summary request on a session with nothing stored.
const NO_MESSAGES_MARKER: &str = "No messages found";

/// Fallback summary text when the backend omits `summary.summary`.
const DEFAULT_SUMMARY_TEXT: &str = "Summary generated";

// =============================================================================
// Wire Types
// =============================================================================

/// Body of `POST /api/conversation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub session_id: String,
    pub role: TranscriptRole,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct SummaryRequestBody<'a> {
    session_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionCredentialResponse {
    client_secret: Option<ClientSecret>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClientSecret {
    value: Option<String>,
}

/// Nested `summary` object of a summary response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryBody {
    pub summary: Option<String>,
}

/// Response of `POST /api/generate-summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryResponse {
    pub status: Option<String>,
    pub formatted_summary: Option<String>,
    pub summary: Option<SummaryBody>,
    pub message: Option<String>,
}

impl SummaryResponse {
    /// `status == "success"` with a non-empty formatted summary.
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
            && self
                .formatted_summary
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }

    /// The backend had nothing stored for the session.
    pub fn is_insufficient_data(&self) -> bool {
        self.status.as_deref() == Some("error")
            && self
                .message
                .as_deref()
                .is_some_and(|m| m.contains(NO_MESSAGES_MARKER))
    }

    /// Short summary for the function-call result payload.
    pub fn summary_text(&self) -> &str {
        self.summary
            .as_ref()
            .and_then(|s| s.summary.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUMMARY_TEXT)
    }

    /// Failure message for non-success responses.
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Failed to generate summary".to_string())
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Backend storage and summary service.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Fetch an ephemeral credential for the upstream realtime service.
    async fn fetch_credential(&self) -> ClientResult<String>;

    /// Store one transcript line.
    async fn save_message(&self, message: &ConversationMessage) -> ClientResult<()>;

    /// Generate a summary for a session.
    async fn generate_summary(&self, session_id: &str) -> ClientResult<SummaryResponse>;
}

// =============================================================================
// Cancellation Slot
// =============================================================================

/// Holds the cancellation handle of the single live request of one class.
///
/// Starting a request through the slot cancels whatever request it previously held.
#[derive(Debug, Default)]
pub struct RequestSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request, cancelling the previous one.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the request currently held, if any.
    pub fn cancel_inflight(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }

    /// Run `request` as the live request of this slot.
    ///
    /// Resolves to [`ClientError::Cancelled`] if a newer request starts or
    /// [`cancel_inflight`](Self::cancel_inflight) is called first.
    pub async fn run<T, F>(&self, request: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        let token = self.begin();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ClientError::Cancelled),
            result = request => result,
        }
    }
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// reqwest implementation of [`ConversationBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(
            &config.backend_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn error_body(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let body = if body.trim().is_empty() {
            format!("Status {status}")
        } else {
            body
        };
        ClientError::Http { status, body }
    }
}

#[async_trait]
impl ConversationBackend for HttpBackend {
    async fn fetch_credential(&self) -> ClientResult<String> {
        let response = self
            .client
            .get(self.endpoint(SESSION_PATH))
            .send()
            .await
            .map_err(|e| ClientError::CredentialFetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::CredentialFetch(format!("{status} {body}")));
        }

        let parsed: SessionCredentialResponse = response
            .json()
            .await
            .map_err(|e| ClientError::CredentialFetch(e.to_string()))?;

        let credential = parsed
            .client_secret
            .and_then(|secret| secret.value)
            .filter(|value| !value.is_empty())
            .ok_or(ClientError::MissingCredential)?;

        info!("Ephemeral credential issued");
        Ok(credential)
    }

    async fn save_message(&self, message: &ConversationMessage) -> ClientResult<()> {
        let response = self
            .client
            .post(self.endpoint(CONVERSATION_PATH))
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_body(response).await);
        }

        debug!(
            session_id = %message.session_id,
            role = %message.role,
            "Saved message"
        );
        Ok(())
    }

    async fn generate_summary(&self, session_id: &str) -> ClientResult<SummaryResponse> {
        let response = self
            .client
            .post(self.endpoint(SUMMARY_PATH))
            .json(&SummaryRequestBody { session_id })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_body(response).await);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_summary_response_success() {
        let response: SummaryResponse = serde_json::from_value(json!({
            "status": "success",
            "formatted_summary": "You want an SUV.",
            "summary": {"summary": "SUV, 7 seats"}
        }))
        .unwrap();

        assert!(response.is_success());
        assert!(!response.is_insufficient_data());
        assert_eq!(response.summary_text(), "SUV, 7 seats");
    }

    #[test]
    fn test_summary_response_empty_formatted_summary_is_not_success() {
        let response: SummaryResponse =
            serde_json::from_value(json!({"status": "success", "formatted_summary": "  "}))
                .unwrap();
        assert!(!response.is_success());
        assert_eq!(response.summary_text(), "Summary generated");
    }

    #[test]
    fn test_summary_response_insufficient_data() {
        let response: SummaryResponse = serde_json::from_value(json!({
            "status": "error",
            "message": "No messages found for session session_1"
        }))
        .unwrap();
        assert!(response.is_insufficient_data());

        let other: SummaryResponse =
            serde_json::from_value(json!({"status": "error", "message": "boom"})).unwrap();
        assert!(!other.is_insufficient_data());
        assert_eq!(other.failure_message(), "boom");
    }

    #[test]
    fn test_conversation_message_serialization() {
        let message = ConversationMessage {
            session_id: "session_1".to_string(),
            role: TranscriptRole::User,
            content: "I want an SUV".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"session_id": "session_1", "role": "user", "content": "I want an SUV"})
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.endpoint(SESSION_PATH),
            "http://localhost:8000/api/session"
        );
    }

    #[tokio::test]
    async fn test_request_slot_supersedes_previous() {
        let slot = Arc::new(RequestSlot::new());

        let first = {
            let slot = slot.clone();
            tokio::spawn(async move {
                slot.run(async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, ClientError>(1)
                })
                .await
            })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = slot.run(async { Ok::<_, ClientError>(2) }).await;
        assert_eq!(second.unwrap(), 2);

        let first = first.await.unwrap();
        assert!(matches!(first, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn test_request_slot_cancel_inflight() {
        let slot = Arc::new(RequestSlot::new());
        let pending = {
            let slot = slot.clone();
            tokio::spawn(async move {
                slot.run(std::future::pending::<ClientResult<()>>()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        slot.cancel_inflight();

        assert!(matches!(pending.await.unwrap(), Err(ClientError::Cancelled)));
    }
}
