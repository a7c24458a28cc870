use crate::defaults;
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::Level;

/// Configuration for a [crate::SigningService].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_nonce_fetch_timeout_ms")]
    pub nonce_fetch_timeout_ms: u64,
    /// `null` disables the auth-token deadline check.
    #[serde(default = "default_max_auth_token_lifetime_secs")]
    pub max_auth_token_lifetime_secs: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
}

#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub nonce_fetch_timeout: Duration,
    /// Furthest an auth-token deadline may lie in the future. `None` accepts any deadline.
    pub max_auth_token_lifetime: Option<Duration>,
    /// Level for the embedding application's subscriber. The library never installs one; it
    /// only emits `tracing` events.
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nonce_fetch_timeout_ms: default_nonce_fetch_timeout_ms(),
            max_auth_token_lifetime_secs: default_max_auth_token_lifetime_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        Self {
            nonce_fetch_timeout: Duration::from_millis(defaults::DEFAULT_NONCE_FETCH_TIMEOUT_MS),
            max_auth_token_lifetime: Some(Duration::from_secs(
                defaults::DEFAULT_MAX_AUTH_TOKEN_LIFETIME_SECS,
            )),
            log_level: Level::INFO,
        }
    }
}

fn default_nonce_fetch_timeout_ms() -> u64 {
    defaults::DEFAULT_NONCE_FETCH_TIMEOUT_MS
}

fn default_max_auth_token_lifetime_secs() -> Option<u64> {
    Some(defaults::DEFAULT_MAX_AUTH_TOKEN_LIFETIME_SECS)
}

fn default_log_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_string()
}

fn ensure_nonzero_u64(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

impl Config {
    pub fn from_yaml_str(value: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(value)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        ensure_nonzero_u64("nonce_fetch_timeout_ms", self.nonce_fetch_timeout_ms)?;
        if let Some(secs) = self.max_auth_token_lifetime_secs {
            ensure_nonzero_u64("max_auth_token_lifetime_secs", secs)?;
        }

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        Ok(ValidatedConfig {
            nonce_fetch_timeout: Duration::from_millis(self.nonce_fetch_timeout_ms),
            max_auth_token_lifetime: self
                .max_auth_token_lifetime_secs
                .map(Duration::from_secs),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config, Config::default());

        let validated = config.validate().unwrap();
        assert_eq!(validated.nonce_fetch_timeout, Duration::from_secs(10));
        assert_eq!(
            validated.max_auth_token_lifetime,
            Some(Duration::from_secs(7 * 3600))
        );
        assert_eq!(validated.log_level, Level::INFO);
    }

    #[test]
    fn test_parses_overrides() {
        let config = Config::from_yaml_str(
            "nonce_fetch_timeout_ms: 2500\nmax_auth_token_lifetime_secs: 600\nlog_level: debug\n",
        )
        .unwrap();
        let validated = config.validate().unwrap();
        assert_eq!(validated.nonce_fetch_timeout, Duration::from_millis(2500));
        assert_eq!(
            validated.max_auth_token_lifetime,
            Some(Duration::from_secs(600))
        );
        assert_eq!(validated.log_level, Level::DEBUG);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = Config {
            nonce_fetch_timeout_ms: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("nonce_fetch_timeout_ms"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_null_lifetime_disables_deadline_check() {
        let config = Config::from_yaml_str("max_auth_token_lifetime_secs: null\n").unwrap();
        assert_eq!(config.max_auth_token_lifetime_secs, None);
        assert_eq!(config.validate().unwrap().max_auth_token_lifetime, None);

        let zero = Config {
            max_auth_token_lifetime_secs: Some(0),
            ..Config::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidNonZero {
                field: "max_auth_token_lifetime_secs",
                value: 0
            })
        ));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(matches!(
            Config::from_yaml_str("nonce_fetch_timeout_ms: [1, 2]"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_yaml_file("/nonexistent/tradesign.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
