//! OpenAI Realtime API configuration types.
//!
//! The browser-style (WebRTC) flavour of the API negotiates media over plain HTTPS: the SDP
//! offer is POSTed to [`OPENAI_REALTIME_URL`] and the JSON event stream rides on a data
//! channel labelled [`DEFAULT_DATA_CHANNEL_LABEL`].

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API SDP exchange endpoint.
pub const OPENAI_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";

/// Label of the message channel carrying realtime events.
pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "oai-events";

/// Content type of the offer body and the answer.
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

// =============================================================================
// Models
// =============================================================================

/// Supported OpenAI Realtime models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAIRealtimeModel {
    /// GPT-4o Realtime Preview model
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Realtime Preview 2024-10-01
    #[serde(rename = "gpt-4o-realtime-preview-2024-10-01")]
    Gpt4oRealtimePreview20241001,
    /// GPT-4o Realtime Preview 2024-12-17 (default)
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview-2024-12-17")]
    Gpt4oRealtimePreview20241217,
    /// GPT-4o Mini Realtime Preview
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
    /// GPT-4o Mini Realtime Preview 2024-12-17
    #[serde(rename = "gpt-4o-mini-realtime-preview-2024-12-17")]
    Gpt4oMiniRealtimePreview20241217,
}

impl OpenAIRealtimeModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oRealtimePreview20241001 => "gpt-4o-realtime-preview-2024-10-01",
            Self::Gpt4oRealtimePreview20241217 => "gpt-4o-realtime-preview-2024-12-17",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
            Self::Gpt4oMiniRealtimePreview20241217 => "gpt-4o-mini-realtime-preview-2024-12-17",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gpt-4o-realtime-preview" => Some(Self::Gpt4oRealtimePreview),
            "gpt-4o-realtime-preview-2024-10-01" => Some(Self::Gpt4oRealtimePreview20241001),
            "gpt-4o-realtime-preview-2024-12-17" => Some(Self::Gpt4oRealtimePreview20241217),
            "gpt-4o-mini-realtime-preview" => Some(Self::Gpt4oMiniRealtimePreview),
            "gpt-4o-mini-realtime-preview-2024-12-17" => {
                Some(Self::Gpt4oMiniRealtimePreview20241217)
            }
            _ => None,
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl std::fmt::Display for OpenAIRealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_as_str() {
        assert_eq!(
            OpenAIRealtimeModel::Gpt4oRealtimePreview20241217.as_str(),
            "gpt-4o-realtime-preview-2024-12-17"
        );
        assert_eq!(
            OpenAIRealtimeModel::Gpt4oMiniRealtimePreview.as_str(),
            "gpt-4o-mini-realtime-preview"
        );
    }

    #[test]
    fn test_model_from_str() {
        assert_eq!(
            OpenAIRealtimeModel::from_str_or_default("GPT-4o-Realtime-Preview"),
            OpenAIRealtimeModel::Gpt4oRealtimePreview
        );
        assert_eq!(
            OpenAIRealtimeModel::from_str_or_default("unknown"),
            OpenAIRealtimeModel::Gpt4oRealtimePreview20241217
        );
        assert_eq!(OpenAIRealtimeModel::parse("unknown"), None);
    }

    #[test]
    fn test_constants() {
        assert_eq!(OPENAI_REALTIME_URL, "https://api.openai.com/v1/realtime");
        assert_eq!(DEFAULT_DATA_CHANNEL_LABEL, "oai-events");
    }
}
