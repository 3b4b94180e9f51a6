use thiserror::Error;
use trading::RequestId;

/// Errors returned to producers by [`crate::DealProcessor::submit`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// The processor was never started or has begun shutting down.
    #[error("Processor not running, request {0} not accepted")]
    NotRunning(RequestId),
}

/// Errors raised while loading or checking [`crate::ProcessorConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by [`crate::DealProcessor::start`].
#[derive(Error, Debug)]
pub enum StartError {
    /// A stopped processor cannot be restarted; build a new one.
    #[error("Processor already stopped")]
    AlreadyStopped,

    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        source: std::io::Error,
    },
}
