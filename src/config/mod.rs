//! Configuration module for the voice client
//!
//! Configuration comes from several sources. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_voice_client::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ClientConfig::from_file(&PathBuf::from("client.yaml"))?;
//!
//! println!("Backend at {}", config.backend_url);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub mod env;
mod validation;
mod yaml;

pub use yaml::{
    BackendYaml, MessagesYaml, PersistenceYaml, RealtimeYaml, SummaryYaml, TranscriptYaml,
    YamlConfig,
};

use crate::core::realtime::{DEFAULT_DATA_CHANNEL_LABEL, OPENAI_REALTIME_URL, OpenAIRealtimeModel};
use crate::errors::{ClientError, ClientResult};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_ASSISTANT_PREFIX: &str = "Assistant: ";
pub const DEFAULT_USER_PREFIX: &str = "You: ";
pub const DEFAULT_PERSIST_COOLDOWN_MS: u64 = 1000;
pub const DEFAULT_SUMMARY_FALLBACK_MS: u64 = 8000;
pub const DEFAULT_RENDER_FRAME_MS: u64 = 16;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// What happens to transcript history when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptPolicy {
    /// Clear everything; the next session starts from the placeholder
    #[default]
    Reset,
    /// Keep the shown text as the baseline of the next session
    Preserve,
}

impl TranscriptPolicy {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptPolicy::Reset => "reset",
            TranscriptPolicy::Preserve => "preserve",
        }
    }

    pub fn parse(s: &str) -> ClientResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "reset" => Ok(TranscriptPolicy::Reset),
            "preserve" => Ok(TranscriptPolicy::Preserve),
            other => Err(ClientError::Configuration(format!(
                "Invalid transcript policy '{other}', expected 'reset' or 'preserve'"
            ))),
        }
    }
}

impl fmt::Display for TranscriptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canned assistant lines, without the speaker prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedMessages {
    /// Summary requested before any session exists
    pub need_conversation: String,
    /// Backend had nothing stored to summarize
    pub insufficient_data: String,
    /// Summary request failed
    pub summary_failed: String,
    /// `message` field of the function result sent upstream
    pub summary_result: String,
}

impl Default for CannedMessages {
    fn default() -> Self {
        Self {
            need_conversation: "We need to have a conversation first before I can generate a summary. Please tell me about your requirements!".to_string(),
            insufficient_data: "We just started our conversation! Let's discuss your needs first, and then I'll provide a comprehensive summary.".to_string(),
            summary_failed: "I'd be happy to provide a summary once we've had a proper conversation! Please tell me about your requirements and I'll give you personalized recommendations.".to_string(),
            summary_result: "Summary generated successfully. Here's what we discussed:".to_string(),
        }
    }
}

/// Voice client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the backend serving `/api/session`, `/api/conversation`, `/api/generate-summary`
    pub backend_url: String,
    /// SDP exchange endpoint of the realtime service
    pub realtime_url: String,
    pub realtime_model: String,
    pub data_channel_label: String,
    pub assistant_prefix: String,
    pub user_prefix: String,
    /// Minimum interval between stored lines per (session, role)
    pub persist_cooldown_ms: u64,
    /// Upper bound on waiting for the spoken summary before teardown
    pub summary_teardown_fallback_ms: u64,
    /// Render coalescing window
    pub render_frame_ms: u64,
    pub request_timeout_secs: u64,
    pub transcript_on_stop: TranscriptPolicy,
    /// Empty disables the keyword-triggered summary
    pub summary_keywords: Vec<String>,
    pub messages: CannedMessages,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            realtime_url: OPENAI_REALTIME_URL.to_string(),
            realtime_model: OpenAIRealtimeModel::default().as_str().to_string(),
            data_channel_label: DEFAULT_DATA_CHANNEL_LABEL.to_string(),
            assistant_prefix: DEFAULT_ASSISTANT_PREFIX.to_string(),
            user_prefix: DEFAULT_USER_PREFIX.to_string(),
            persist_cooldown_ms: DEFAULT_PERSIST_COOLDOWN_MS,
            summary_teardown_fallback_ms: DEFAULT_SUMMARY_FALLBACK_MS,
            render_frame_ms: DEFAULT_RENDER_FRAME_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            transcript_on_stop: TranscriptPolicy::default(),
            summary_keywords: Vec::new(),
            messages: CannedMessages::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables over defaults.
    ///
    /// The `.env` file is loaded by the binary at startup, so its values are already visible
    /// as environment variables here.
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns [`ClientError::Configuration`] if the YAML file cannot be read or is malformed,
    /// an environment variable has an invalid format, or validation fails.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::default();
        config.apply_env()?;
        config.apply_yaml(yaml_config)?;
        validation::validate(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> ClientResult<()> {
        if let Some(v) = env::string(env::BACKEND_URL) {
            self.backend_url = v;
        }
        if let Some(v) = env::string(env::REALTIME_URL) {
            self.realtime_url = v;
        }
        if let Some(v) = env::string(env::REALTIME_MODEL) {
            self.realtime_model = v;
        }
        if let Some(v) = env::string(env::ASSISTANT_PREFIX) {
            self.assistant_prefix = v;
        }
        if let Some(v) = env::string(env::USER_PREFIX) {
            self.user_prefix = v;
        }
        if let Some(v) = env::parse(env::PERSIST_COOLDOWN_MS)? {
            self.persist_cooldown_ms = v;
        }
        if let Some(v) = env::parse(env::SUMMARY_FALLBACK_MS)? {
            self.summary_teardown_fallback_ms = v;
        }
        if let Some(v) = env::parse(env::RENDER_FRAME_MS)? {
            self.render_frame_ms = v;
        }
        if let Some(v) = env::parse(env::REQUEST_TIMEOUT_SECS)? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env::string(env::TRANSCRIPT_ON_STOP) {
            self.transcript_on_stop = TranscriptPolicy::parse(&v)?;
        }
        if let Some(v) = env::list(env::SUMMARY_KEYWORDS) {
            self.summary_keywords = v;
        }
        Ok(())
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) -> ClientResult<()> {
        if let Some(backend) = yaml.backend {
            if let Some(url) = backend.url {
                self.backend_url = url;
            }
            if let Some(timeout) = backend.request_timeout_secs {
                self.request_timeout_secs = timeout;
            }
        }

        if let Some(realtime) = yaml.realtime {
            if let Some(url) = realtime.url {
                self.realtime_url = url;
            }
            if let Some(model) = realtime.model {
                self.realtime_model = model;
            }
            if let Some(label) = realtime.data_channel_label {
                self.data_channel_label = label;
            }
        }

        if let Some(transcript) = yaml.transcript {
            if let Some(prefix) = transcript.assistant_prefix {
                self.assistant_prefix = prefix;
            }
            if let Some(prefix) = transcript.user_prefix {
                self.user_prefix = prefix;
            }
            if let Some(frame) = transcript.render_frame_ms {
                self.render_frame_ms = frame;
            }
            if let Some(policy) = transcript.on_stop {
                self.transcript_on_stop = TranscriptPolicy::parse(&policy)?;
            }
        }

        if let Some(cooldown) = yaml.persistence.and_then(|p| p.cooldown_ms) {
            self.persist_cooldown_ms = cooldown;
        }

        if let Some(summary) = yaml.summary {
            if let Some(fallback) = summary.teardown_fallback_ms {
                self.summary_teardown_fallback_ms = fallback;
            }
            if let Some(keywords) = summary.keywords {
                self.summary_keywords = keywords
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
            }
        }

        if let Some(messages) = yaml.messages {
            if let Some(text) = messages.need_conversation {
                self.messages.need_conversation = text;
            }
            if let Some(text) = messages.insufficient_data {
                self.messages.insufficient_data = text;
            }
            if let Some(text) = messages.summary_failed {
                self.messages.summary_failed = text;
            }
            if let Some(text) = messages.summary_result {
                self.messages.summary_result = text;
            }
        }

        Ok(())
    }

    #[inline]
    pub fn persist_cooldown(&self) -> Duration {
        Duration::from_millis(self.persist_cooldown_ms)
    }

    #[inline]
    pub fn summary_teardown_fallback(&self) -> Duration {
        Duration::from_millis(self.summary_teardown_fallback_ms)
    }

    #[inline]
    pub fn render_frame(&self) -> Duration {
        Duration::from_millis(self.render_frame_ms)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether the keyword-triggered summary is enabled.
    pub fn keyword_fallback_enabled(&self) -> bool {
        !self.summary_keywords.is_empty()
    }
}
