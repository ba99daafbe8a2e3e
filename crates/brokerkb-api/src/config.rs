use std::fmt;

use brokerkb_core::config::{
    db_path_from_lookup, env_snapshot, required_trimmed, value_or_default, ConfigError, DifyConfig,
};

const MIN_ADMIN_TOKEN_LEN: usize = 16;

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub admin_api_token: String,
    pub dify: Option<DifyConfig>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path)
            .field("admin_api_token", &"[REDACTED]")
            .field("dify", &self.dify)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values = env_snapshot();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "BROKERKB_BIND_ADDR", "127.0.0.1:8080");
        let db_path = db_path_from_lookup(&lookup);

        let admin_api_token = required_trimmed(&lookup, "ADMIN_API_TOKEN")?;
        if admin_api_token.chars().count() < MIN_ADMIN_TOKEN_LEN {
            return Err(ConfigError::Invalid(format!(
                "ADMIN_API_TOKEN must be at least {MIN_ADMIN_TOKEN_LEN} characters"
            )));
        }

        let dify = DifyConfig::from_lookup(&lookup)?;
        if dify.is_none() {
            tracing::warn!("DIFY_API_KEY and DIFY_DATASET_ID are unset; sync routes are disabled");
        }

        Ok(Self {
            bind_addr,
            db_path,
            admin_api_token,
            dify,
        })
    }
}
