//! Runtime configuration for the sampling engine.
//!
//! The engine has a small configuration surface: the reload debounce window,
//! the default sample size, actor inbox capacity and an optional RNG seed.
//! Every value can be overridden from the environment.

use std::time::Duration;
use thiserror::Error;

/// Default number of seconds between two successful reloads of a workflow.
pub const DEFAULT_RELOAD_DEBOUNCE_SECS: u64 = 600;

/// Default number of subjects (or pairs) returned by a sample.
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Default capacity of each workflow and user inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration shared by every workflow and user actor.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Minimum spacing between successful reloads of one workflow.
    pub reload_debounce: Duration,
    /// Sample size used when a caller does not pass one.
    pub default_limit: usize,
    /// Bounded capacity of every actor inbox.
    pub inbox_capacity: usize,
    /// Seed for reproducible sampling (None = seeded from entropy).
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            reload_debounce: Duration::from_secs(DEFAULT_RELOAD_DEBOUNCE_SECS),
            default_limit: DEFAULT_SAMPLE_LIMIT,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELOAD_TIMER`: Reload debounce in seconds (default: 600)
    /// - `SAMPLE_LIMIT`: Default sample size (default: 5)
    /// - `INBOX_CAPACITY`: Actor inbox capacity (default: 256)
    /// - `SAMPLER_SEED`: Seed for reproducible sampling (default: unset)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable or invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("RELOAD_TIMER") {
            let secs: u64 = parse_env_value(&val, "RELOAD_TIMER")?;
            config.reload_debounce = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("SAMPLE_LIMIT") {
            config.default_limit = parse_env_value(&val, "SAMPLE_LIMIT")?;
        }

        if let Some(val) = lookup("INBOX_CAPACITY") {
            config.inbox_capacity = parse_env_value(&val, "INBOX_CAPACITY")?;
        }

        if let Some(val) = lookup("SAMPLER_SEED") {
            config.seed = Some(parse_env_value(&val, "SAMPLER_SEED")?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inbox_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "inbox_capacity must be greater than 0".to_string(),
            ));
        }

        if self.default_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "default_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Sets the reload debounce window.
    pub fn with_reload_debounce(mut self, debounce: Duration) -> Self {
        self.reload_debounce = debounce;
        self
    }

    /// Sets the default sample size.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Sets the actor inbox capacity.
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
