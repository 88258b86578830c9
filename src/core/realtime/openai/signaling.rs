//! SDP offer/answer exchange with the OpenAI Realtime API.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info};

use super::config::{OPENAI_REALTIME_URL, OpenAIRealtimeModel, SDP_CONTENT_TYPE};
use crate::config::ClientConfig;
use crate::core::realtime::base::{SdpType, SessionDescription};
use crate::errors::{ClientError, ClientResult};

/// Performs the offer/answer exchange for a new peer connection.
#[async_trait]
pub trait RealtimeSignaling: Send + Sync {
    /// POST `offer` with the ephemeral `credential` and return the remote answer.
    async fn exchange(
        &self,
        credential: &str,
        offer: &SessionDescription,
    ) -> ClientResult<SessionDescription>;
}

/// HTTP signaling against the realtime endpoint.
#[derive(Debug, Clone)]
pub struct OpenAISignaling {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OpenAISignaling {
    pub fn new(url: &str, model: &str, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(
            &config.realtime_url,
            &config.realtime_model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for OpenAISignaling {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: OPENAI_REALTIME_URL.to_string(),
            model: OpenAIRealtimeModel::default().as_str().to_string(),
        }
    }
}

#[async_trait]
impl RealtimeSignaling for OpenAISignaling {
    async fn exchange(
        &self,
        credential: &str,
        offer: &SessionDescription,
    ) -> ClientResult<SessionDescription> {
        if offer.sdp_type != SdpType::Offer {
            return Err(ClientError::Signaling(
                "Expected an SDP offer for the exchange".to_string(),
            ));
        }

        debug!(model = %self.model, "Posting SDP offer");
        let response = self
            .client
            .post(&self.url)
            .query(&[("model", self.model.as_str())])
            .header(AUTHORIZATION, format!("Bearer {credential}"))
            .header(CONTENT_TYPE, SDP_CONTENT_TYPE)
            .body(offer.sdp.clone())
            .send()
            .await
            .map_err(|e| ClientError::Signaling(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::Signaling(format!("{status}: {body}")));
        }

        let sdp = response
            .text()
            .await
            .map_err(|e| ClientError::Signaling(e.to_string()))?;

        info!(model = %self.model, "Received SDP answer");
        Ok(SessionDescription::answer(sdp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_signaling_targets_openai() {
        let signaling = OpenAISignaling::default();
        assert_eq!(signaling.url, OPENAI_REALTIME_URL);
        assert_eq!(signaling.model(), "gpt-4o-realtime-preview-2024-12-17");
    }

    #[tokio::test]
    async fn test_exchange_rejects_answer_input() {
        let signaling = OpenAISignaling::default();
        let result = signaling
            .exchange("ek_test", &SessionDescription::answer("v=0"))
            .await;
        assert!(matches!(result, Err(ClientError::Signaling(_))));
    }
}
