//! Environment-driven client configuration.

use std::time::Duration;

use crate::error::ConfigError;

pub const BASE_URL_VAR: &str = "STARTER_API_BASE_URL";
pub const TIMEOUT_VAR: &str = "STARTER_API_TIMEOUT_SECS";

/// Settings needed to construct a `StarterClient` with the default transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout for the reqwest transport. `None` leaves reqwest's
    /// default (no timeout).
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read `STARTER_API_BASE_URL` and `STARTER_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(BASE_URL_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(BASE_URL_VAR))?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: BASE_URL_VAR,
                value: base_url,
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }

        let timeout = match lookup(TIMEOUT_VAR) {
            None => None,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        name: TIMEOUT_VAR,
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        name: TIMEOUT_VAR,
                        value: raw,
                        reason: "must be at least one second".to_string(),
                    });
                }
                Some(Duration::from_secs(secs))
            }
        };

        Ok(Self { base_url, timeout })
    }
}
