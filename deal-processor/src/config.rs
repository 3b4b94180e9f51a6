//! Processor configuration.
//!
//! Values are fixed at construction. [`ProcessorConfig::load`] layers, from
//! lowest to highest precedence: built-in (or caller-supplied) defaults, an
//! optional TOML file and `DEAL_PROCESSOR_*` environment variables
//! (e.g. `DEAL_PROCESSOR_WORKERS=8`).

use crate::engine::retry::RetryPolicy;
use crate::error::ConfigError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "DEAL_PROCESSOR";

fn default_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    100
}

fn default_retry_max_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Number of worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Additional attempts after the first one for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay of the exponential backoff.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Upper bound of a single backoff delay.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    /// Treat server-side rejections as transient.
    #[serde(default)]
    pub retry_rejections: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_rejections: false,
        }
    }
}

impl ProcessorConfig {
    pub fn new(workers: usize, max_retries: u32, retry_base: Duration) -> Self {
        Self {
            workers,
            max_retries,
            retry_base_ms: retry_base.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn with_retry_rejections(mut self, retry: bool) -> Self {
        self.retry_rejections = retry;
        self
    }

    /// Loads the configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_over(&Self::default(), path)
    }

    /// Like [`ProcessorConfig::load`], with `base` in place of the built-in defaults.
    pub fn load_over(base: &ProcessorConfig, path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(base)?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: ProcessorConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.retry_base_ms > self.retry_max_ms {
            return Err(ConfigError::Invalid(format!(
                "retry_base_ms ({}) exceeds retry_max_ms ({})",
                self.retry_base_ms, self.retry_max_ms
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_ms))
            .with_max_backoff(Duration::from_millis(self.retry_max_ms))
            .with_retry_rejections(self.retry_rejections)
    }
}
