//! API connection settings
//!
//! Settings come from the environment (or from the CLI, which falls back to
//! the same variables). The token is assumed to have been acquired elsewhere.

use std::time::Duration;

use thiserror::Error;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://stable.alphatrader.de";

/// Default refresh interval in minutes
pub const DEFAULT_REFRESH_MINUTES: u64 = 5;

/// Largest accepted refresh interval in minutes (one year)
pub const MAX_REFRESH_MINUTES: u64 = 365 * 24 * 60;

pub const ENV_API_URL: &str = "ALPHATRADER_API_URL";
pub const ENV_TOKEN: &str = "ALPHATRADER_TOKEN";
pub const ENV_PARTNER_ID: &str = "ALPHATRADER_PARTNER_ID";
pub const ENV_REFRESH_MINUTES: &str = "ALPHATRADER_REFRESH_MINUTES";
pub const ENV_TIMEOUT_SECS: &str = "ALPHATRADER_TIMEOUT_SECS";

/// Errors that can occur while assembling the configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent or empty
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A numeric setting could not be parsed
    #[error("Invalid value for {name}: '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Connection settings for the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL, without trailing slash
    pub api_url: String,
    /// Bearer token sent in `Authorization`
    pub token: String,
    /// Partner id sent in `X-Authorization`
    pub partner_id: String,
    /// How often resident cache entries are reloaded
    pub refresh_interval: Duration,
    /// Per-request timeout, if any
    pub timeout: Option<Duration>,
}

impl ApiConfig {
    /// Creates a configuration with default URL and refresh interval
    pub fn new(token: impl Into<String>, partner_id: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            partner_id: partner_id.into(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_MINUTES * 60),
            timeout: None,
        }
    }

    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup
    ///
    /// Empty values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = get(ENV_TOKEN).ok_or(ConfigError::Missing(ENV_TOKEN))?;
        let partner_id = get(ENV_PARTNER_ID).ok_or(ConfigError::Missing(ENV_PARTNER_ID))?;

        let mut config = Self::new(token, partner_id);
        if let Some(url) = get(ENV_API_URL) {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(minutes) = get(ENV_REFRESH_MINUTES) {
            config.refresh_interval = refresh_interval(
                ENV_REFRESH_MINUTES,
                parse_number(ENV_REFRESH_MINUTES, &minutes)?,
            )?;
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            config.timeout = Some(Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &secs)?));
        }
        Ok(config)
    }
}

/// Converts a refresh interval in minutes, rejecting values above
/// [`MAX_REFRESH_MINUTES`]
pub fn refresh_interval(name: &'static str, minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .filter(|_| minutes <= MAX_REFRESH_MINUTES)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidNumber {
            name,
            value: minutes.to_string(),
        })
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}
