//! Environment-driven configuration shared by the API server and the CLI.
//!
//! Values are read through a lookup closure so callers can feed either the
//! process environment or a fixed map in tests.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_DIFY_API_URL: &str = "https://api.dify.ai/v1";
pub const DEFAULT_DB_PATH: &str = "brokerkb.db";
const DEFAULT_DIFY_TIMEOUT_SECS: &str = "30";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Credentials and endpoint for the Dify dataset API
#[derive(Clone, PartialEq, Eq)]
pub struct DifyConfig {
    pub api_url: String,
    pub api_key: String,
    pub dataset_id: String,
    pub timeout: Duration,
}

impl fmt::Debug for DifyConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DifyConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("dataset_id", &self.dataset_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DifyConfig {
    /// Read the Dify settings from the process environment.
    ///
    /// Returns `Ok(None)` when neither `DIFY_API_KEY` nor `DIFY_DATASET_ID` is set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let values = env_snapshot();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let api_key = optional_trimmed(&lookup, "DIFY_API_KEY");
        let dataset_id = optional_trimmed(&lookup, "DIFY_DATASET_ID");
        if api_key.is_none() && dataset_id.is_none() {
            return Ok(None);
        }

        let api_key = api_key.ok_or(ConfigError::MissingVar("DIFY_API_KEY"))?;
        let dataset_id = dataset_id.ok_or(ConfigError::MissingVar("DIFY_DATASET_ID"))?;

        let api_url = value_or_default(&lookup, "DIFY_API_URL", DEFAULT_DIFY_API_URL);
        if !is_http_url(&api_url) {
            return Err(ConfigError::Invalid(
                "DIFY_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let timeout_secs = value_or_default(&lookup, "DIFY_TIMEOUT_SECS", DEFAULT_DIFY_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid("DIFY_TIMEOUT_SECS must be an integer in [1, 300]".to_string())
            })?;
        if !(1..=300).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(
                "DIFY_TIMEOUT_SECS must be in [1, 300]".to_string(),
            ));
        }

        Ok(Some(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            dataset_id,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}

/// Location of the libSQL database file
pub fn db_path_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> String {
    value_or_default(lookup, "BROKERKB_DB_PATH", DEFAULT_DB_PATH)
}

pub fn env_snapshot() -> HashMap<String, String> {
    env::vars().collect()
}

pub fn value_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

pub fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

pub fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}
