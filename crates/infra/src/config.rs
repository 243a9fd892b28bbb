//! Configuration loading and representation.

use std::time::Duration;

use thiserror::Error;

pub const DATABASE_URL_VAR: &str = "CARESTOCK_DATABASE_URL";
pub const ALLOCATION_ATTEMPTS_VAR: &str = "CARESTOCK_ALLOCATION_ATTEMPTS";
pub const ACQUIRE_TIMEOUT_VAR: &str = "CARESTOCK_ACQUIRE_TIMEOUT_MS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime settings for the storage engine and services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// sqlx SQLite URL, e.g. `sqlite://carestock.db` or `sqlite::memory:`.
    pub database_url: String,
    /// Decide-then-insert attempts per allocation (first try included).
    pub allocation_attempts: u32,
    /// How long to wait for the storage connection before giving up.
    pub acquire_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://carestock.db".to_string(),
            allocation_attempts: 2,
            acquire_timeout: Duration::from_millis(5_000),
        }
    }
}

impl CoreConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(DATABASE_URL_VAR) {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: DATABASE_URL_VAR,
                    reason: "must not be empty".to_string(),
                });
            }
            config.database_url = url;
        }

        if let Some(raw) = lookup(ALLOCATION_ATTEMPTS_VAR) {
            let attempts = parse_number::<u32>(ALLOCATION_ATTEMPTS_VAR, &raw)?;
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: ALLOCATION_ATTEMPTS_VAR,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.allocation_attempts = attempts;
        }

        if let Some(raw) = lookup(ACQUIRE_TIMEOUT_VAR) {
            let millis = parse_number::<u64>(ACQUIRE_TIMEOUT_VAR, &raw)?;
            config.acquire_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{raw}': {e}"),
    })
}
