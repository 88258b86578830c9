use serde::Deserialize;
use std::path::Path;

use crate::errors::{ClientError, ClientResult};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here override
/// environment variables.
///
/// # Example YAML structure
/// ```yaml
/// backend:
///   url: "http://localhost:8000"
///   request_timeout_secs: 30
///
/// realtime:
///   url: "https://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///   data_channel_label: "oai-events"
///
/// transcript:
///   assistant_prefix: "Assistant: "
///   user_prefix: "You: "
///   render_frame_ms: 16
///   on_stop: "reset"
///
/// persistence:
///   cooldown_ms: 1000
///
/// summary:
///   teardown_fallback_ms: 8000
///   keywords:
///     - "summary"
///     - "summarize"
///
/// messages:
///   need_conversation: "We need to talk first."
///   insufficient_data: "Let's talk first."
///   summary_failed: "Sorry, please try again."
///   summary_result: "Summary generated successfully. Here's what we discussed:"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub backend: Option<BackendYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub transcript: Option<TranscriptYaml>,
    pub persistence: Option<PersistenceYaml>,
    pub summary: Option<SummaryYaml>,
    pub messages: Option<MessagesYaml>,
}

/// Backend service configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BackendYaml {
    pub url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// Upstream realtime service configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub url: Option<String>,
    pub model: Option<String>,
    pub data_channel_label: Option<String>,
}

/// Transcript rendering configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptYaml {
    pub assistant_prefix: Option<String>,
    pub user_prefix: Option<String>,
    pub render_frame_ms: Option<u64>,
    /// `reset` or `preserve`
    pub on_stop: Option<String>,
}

/// Persistence relay configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PersistenceYaml {
    pub cooldown_ms: Option<u64>,
}

/// Summary function configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SummaryYaml {
    pub teardown_fallback_ms: Option<u64>,
    /// Phrases in a user utterance that trigger a summary without a model function call
    pub keywords: Option<Vec<String>>,
}

/// Canned assistant lines from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MessagesYaml {
    pub need_conversation: Option<String>,
    pub insufficient_data: Option<String>,
    pub summary_failed: Option<String>,
    pub summary_result: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns [`ClientError::Configuration`] if the file cannot be read or the YAML is
    /// malformed.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents)
            .map_err(|e| ClientError::Configuration(format!("Failed to parse YAML config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
backend:
  url: "http://backend.internal:9000"
  request_timeout_secs: 12

realtime:
  url: "https://realtime.example.com/v1/realtime"
  model: "gpt-4o-mini-realtime-preview"
  data_channel_label: "events"

transcript:
  assistant_prefix: "Ishmael: "
  user_prefix: "Me: "
  render_frame_ms: 33
  on_stop: "preserve"

persistence:
  cooldown_ms: 250

summary:
  teardown_fallback_ms: 5000
  keywords: ["summary", "wrap up"]

messages:
  need_conversation: "Talk to me first."
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let backend = config.backend.unwrap();
        assert_eq!(backend.url.as_deref(), Some("http://backend.internal:9000"));
        assert_eq!(backend.request_timeout_secs, Some(12));

        let realtime = config.realtime.unwrap();
        assert_eq!(realtime.model.as_deref(), Some("gpt-4o-mini-realtime-preview"));
        assert_eq!(realtime.data_channel_label.as_deref(), Some("events"));

        let transcript = config.transcript.unwrap();
        assert_eq!(transcript.assistant_prefix.as_deref(), Some("Ishmael: "));
        assert_eq!(transcript.on_stop.as_deref(), Some("preserve"));

        assert_eq!(config.persistence.unwrap().cooldown_ms, Some(250));

        let summary = config.summary.unwrap();
        assert_eq!(summary.teardown_fallback_ms, Some(5000));
        assert_eq!(
            summary.keywords,
            Some(vec!["summary".to_string(), "wrap up".to_string()])
        );

        let messages = config.messages.unwrap();
        assert_eq!(messages.need_conversation.as_deref(), Some("Talk to me first."));
        assert!(messages.summary_failed.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.backend.is_none());
        assert!(config.summary.is_none());
    }

    #[test]
    fn test_yaml_config_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("client.yaml");
        fs::write(&path, "persistence:\n  cooldown_ms: 42\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(config.persistence.unwrap().cooldown_ms, Some(42));
    }

    #[test]
    fn test_yaml_config_missing_file() {
        let result = YamlConfig::from_file(Path::new("/nonexistent/client.yaml"));
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_yaml_config_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.yaml");
        fs::write(&path, "persistence: [unclosed").unwrap();

        let result = YamlConfig::from_file(&path);
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
