use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::cache::token::DEFAULT_TOKEN_SPACE;
use crate::error::{ConfigError, ConfigResult};

// Default configuration values
const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_MS: u64 = 150;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Settings of the retry state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// How long a failed operation stays retryable
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout_secs: u64,
    /// Delay between status checks on a queued submission
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// How often the background sweep evicts expired operations
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Retry tokens are drawn from `[0, token_space)`
    #[serde(default = "default_token_space")]
    pub token_space: u32,
}

fn default_retry_timeout() -> u64 {
    std::env::var("LOGIN_RELAY_RETRY_TIMEOUT_SECS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_RETRY_TIMEOUT_SECS)
}

fn default_poll_interval() -> u64 {
    std::env::var("LOGIN_RELAY_POLL_INTERVAL_MS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
}

fn default_sweep_interval() -> u64 {
    std::env::var("LOGIN_RELAY_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS)
}

fn default_token_space() -> u32 {
    std::env::var("LOGIN_RELAY_TOKEN_SPACE")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_TOKEN_SPACE)
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            retry_timeout_secs: default_retry_timeout(),
            poll_interval_ms: default_poll_interval(),
            sweep_interval_secs: default_sweep_interval(),
            token_space: default_token_space(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a JSON file, falling back to defaults if it doesn't exist
    pub async fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            info!(path = %path.display(), "No configuration file found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path).await?;
        let config: RelayConfig = serde_json::from_str(&contents)?;
        config.validate()?;

        debug!(?config, "Loaded relay configuration");
        Ok(config)
    }

    /// Reject settings the state machine can't work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "retry_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "sweep_interval_secs",
                "must be greater than zero",
            ));
        }
        if self.token_space == 0 {
            return Err(ConfigError::invalid("token_space", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs(self.retry_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
