//! Environment variable loading.

use std::env;
use std::str::FromStr;

use crate::errors::{ClientError, ClientResult};

pub const BACKEND_URL: &str = "WAAV_BACKEND_URL";
pub const REALTIME_URL: &str = "WAAV_REALTIME_URL";
pub const REALTIME_MODEL: &str = "WAAV_REALTIME_MODEL";
pub const ASSISTANT_PREFIX: &str = "WAAV_ASSISTANT_PREFIX";
pub const USER_PREFIX: &str = "WAAV_USER_PREFIX";
pub const PERSIST_COOLDOWN_MS: &str = "WAAV_PERSIST_COOLDOWN_MS";
pub const SUMMARY_FALLBACK_MS: &str = "WAAV_SUMMARY_FALLBACK_MS";
pub const RENDER_FRAME_MS: &str = "WAAV_RENDER_FRAME_MS";
pub const REQUEST_TIMEOUT_SECS: &str = "WAAV_REQUEST_TIMEOUT_SECS";
pub const TRANSCRIPT_ON_STOP: &str = "WAAV_TRANSCRIPT_ON_STOP";
pub const SUMMARY_KEYWORDS: &str = "WAAV_SUMMARY_KEYWORDS";

pub const ALL: &[&str] = &[
    BACKEND_URL,
    REALTIME_URL,
    REALTIME_MODEL,
    ASSISTANT_PREFIX,
    USER_PREFIX,
    PERSIST_COOLDOWN_MS,
    SUMMARY_FALLBACK_MS,
    RENDER_FRAME_MS,
    REQUEST_TIMEOUT_SECS,
    TRANSCRIPT_ON_STOP,
    SUMMARY_KEYWORDS,
];

/// Read a string variable as-is; empty values count as unset.
pub fn string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Read and parse a numeric variable.
pub fn parse<T>(name: &str) -> ClientResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match string(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ClientError::Configuration(format!("Invalid value for {name}: '{raw}' ({e})"))
        }),
        None => Ok(None),
    }
}

/// Read a comma-separated list; blank entries are dropped.
pub fn list(name: &str) -> Option<Vec<String>> {
    string(name).map(|raw| split_list(&raw))
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
