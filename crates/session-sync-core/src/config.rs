//! Synchronization configuration.
//!
//! Defaults match the reference cadence (one push every 30 seconds). Values
//! can come from a JSON document or from `SESSION_SYNC_*` environment
//! variables layered over the defaults.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ClientInfo;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Longest accepted sync period (one week).
pub const MAX_SYNC_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

const ENV_URL: &str = "SESSION_SYNC_URL";
const ENV_TOKEN: &str = "SESSION_SYNC_TOKEN";
const ENV_INTERVAL: &str = "SESSION_SYNC_INTERVAL_SECS";
const ENV_TIMEOUT: &str = "SESSION_SYNC_TIMEOUT_SECS";
const ENV_INIT_TIMEOUT: &str = "SESSION_SYNC_INIT_TIMEOUT_SECS";
const ENV_INIT_FAILURE: &str = "SESSION_SYNC_INIT_FAILURE";

/// Configuration error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Sync interval must be greater than zero")]
    ZeroInterval,
    #[error("Sync interval must be at most one week, got {0} seconds")]
    IntervalTooLong(u64),
    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("Backend URL must start with http:// or https://: {0}")]
    InvalidUrl(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// What to do when backend initialization fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitFailurePolicy {
    /// Install a local-only record and mark the session ready.
    #[default]
    FallbackLocal,
    /// Leave no record and surface the failure in the session status.
    FailClosed,
}

impl FromStr for InitFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback_local" | "fallback-local" | "local" => Ok(Self::FallbackLocal),
            "fail_closed" | "fail-closed" | "fail" => Ok(Self::FailClosed),
            other => Err(ConfigError::InvalidValue {
                key: ENV_INIT_FAILURE,
                value: other.to_string(),
            }),
        }
    }
}

/// Session synchronization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend base URL. `None` means no remote backend is configured.
    pub base_url: Option<String>,
    /// Bearer token sent with every backend request.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub init_timeout_secs: Option<u64>,
    pub init_failure: InitFailurePolicy,
    pub client_name: String,
    pub client_version: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let client = ClientInfo::default();
        Self {
            base_url: None,
            api_token: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            init_timeout_secs: None,
            init_failure: InitFailurePolicy::default(),
            client_name: client.name,
            client_version: client.version,
        }
    }
}

impl SyncConfig {
    /// Load configuration from `SESSION_SYNC_*` environment variables.
    ///
    /// # Errors
    /// Returns error if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup over the defaults.
    ///
    /// # Errors
    /// Returns error if a value cannot be parsed or fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = Some(url.trim().trim_end_matches('/').to_string());
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            config.api_token = Some(token);
        }
        if let Some(raw) = lookup(ENV_INTERVAL) {
            config.sync_interval_secs = parse_secs(ENV_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            config.request_timeout_secs = parse_secs(ENV_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_INIT_TIMEOUT) {
            config.init_timeout_secs = Some(parse_secs(ENV_INIT_TIMEOUT, &raw)?);
        }
        if let Some(raw) = lookup(ENV_INIT_FAILURE) {
            config.init_failure = raw.parse()?;
        }

        config.validate()?;
        tracing::debug!(
            base_url = ?config.base_url,
            interval_secs = config.sync_interval_secs,
            init_failure = ?config.init_failure,
            "loaded sync config"
        );
        Ok(config)
    }

    /// Parse a JSON config document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the document is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns error on a zero or over-long interval, a zero request timeout,
    /// or a non-HTTP base URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.sync_interval_secs {
            0 => return Err(ConfigError::ZeroInterval),
            secs if secs > MAX_SYNC_INTERVAL_SECS => {
                return Err(ConfigError::IntervalTooLong(secs));
            }
            _ => {}
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn init_timeout(&self) -> Option<Duration> {
        self.init_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            name: self.client_name.clone(),
            version: self.client_version.clone(),
        }
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
