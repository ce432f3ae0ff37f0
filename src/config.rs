use crate::error::ConfigError;
use std::time::Duration;

pub const API_URL_VAR: &str = "VOTE_API_URL";
pub const API_TOKEN_VAR: &str = "VOTE_API_TOKEN";
pub const PROGRESS_DELAY_VAR: &str = "VOTE_PROGRESS_DELAY_MS";

const DEFAULT_PROGRESS_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Staff bearer credential used to follow a voting's stream.
    pub api_token: Option<String>,
    /// Pause between a recorded vote and the progress view.
    pub progress_delay: Duration,
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            api_token: None,
            progress_delay: DEFAULT_PROGRESS_DELAY,
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_progress_delay(mut self, delay: Duration) -> Self {
        self.progress_delay = delay;
        self
    }

    /// Reads the configuration from the process environment, loading a
    /// `.env` file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(API_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(API_URL_VAR))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: API_URL_VAR,
                reason: format!("`{base_url}` is not an http(s) URL"),
            });
        }

        let mut config = Self::new(base_url.trim());

        if let Some(token) = lookup(API_TOKEN_VAR).filter(|v| !v.is_empty()) {
            config = config.with_api_token(token);
        }

        if let Some(raw) = lookup(PROGRESS_DELAY_VAR) {
            let millis = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: PROGRESS_DELAY_VAR,
                reason: e.to_string(),
            })?;
            config = config.with_progress_delay(Duration::from_millis(millis));
        }

        Ok(config)
    }
}
