//! Configuration validation.

use url::Url;

use crate::core::realtime::OpenAIRealtimeModel;
use crate::errors::{ClientError, ClientResult};

use super::ClientConfig;

/// Validate a fully merged configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    validate_http_url("backend_url", &config.backend_url)?;
    validate_http_url("realtime_url", &config.realtime_url)?;

    if config.realtime_model.trim().is_empty() {
        return Err(ClientError::Configuration(
            "realtime_model must not be empty".to_string(),
        ));
    }
    if OpenAIRealtimeModel::parse(&config.realtime_model).is_none() {
        tracing::warn!(
            model = %config.realtime_model,
            "Realtime model is not a known preset, passing it through unchanged"
        );
    }

    if config.data_channel_label.trim().is_empty() {
        return Err(ClientError::Configuration(
            "data_channel_label must not be empty".to_string(),
        ));
    }
    if config.request_timeout_secs == 0 {
        return Err(ClientError::Configuration(
            "request_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if config.render_frame_ms == 0 {
        return Err(ClientError::Configuration(
            "render_frame_ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> ClientResult<()> {
    let url = Url::parse(value)
        .map_err(|e| ClientError::Configuration(format!("Invalid {field} '{value}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ClientError::Configuration(format!(
            "Invalid {field} '{value}': unsupported scheme '{scheme}'"
        ))),
    }
}
