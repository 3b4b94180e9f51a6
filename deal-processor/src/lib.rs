//! # Deal Processor
//!
//! Concurrent dispatch engine for trade requests. Producers submit requests
//! from any thread; a fixed pool of workers drains a shared FIFO queue,
//! validates each request, executes it against a [`trading::Broker`] with
//! retry-with-backoff on transient failures, and records exactly one
//! [`trading::TradeResult`] per request.
//!
//! ## Modules
//! - `queue`: Blocking FIFO work queue with drain-guaranteed shutdown.
//! - `validator`: Pre-execution checks and request deduplication.
//! - `tracker`: Thread-safe result store with per-submitter queries and statistics.
//! - `engine`: Worker pool, per-worker state machine and retry policy.
//! - `config`: Layered processor configuration.
//! - `error`: Error types of the public API.

pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod tracker;
pub mod validator;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::ProcessorConfig;
pub use engine::retry::RetryPolicy;
pub use engine::{DealProcessor, ResultCallback, WorkerState};
pub use error::{ConfigError, StartError, SubmitError};
pub use queue::{QueueClosed, WorkQueue};
pub use tracker::{ExecutionStats, ResultTracker, TicketRecord};
pub use validator::Validator;
