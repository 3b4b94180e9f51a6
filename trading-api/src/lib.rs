//! # Trading API
//!
//! Shared vocabulary between the deal processor, the broker gateways and the
//! client harnesses.
//!
//! ## Modules
//! - `model`: Trade requests, results, instrument and account snapshots, execution outcomes.
//! - `traits`: The `Broker` contract the deal processor executes against.

pub mod model;
pub mod traits;

pub use model::account::AccountInfo;
pub use model::execution::{Disposition, ExecutionFailure, ExecutionOutcome, FailureKind, Fill};
pub use model::identity::{RequestId, SubmitterId};
pub use model::instrument::InstrumentSpec;
pub use model::request::{Side, TradeRequest};
pub use model::result::{TradeResult, TradeStatus};
pub use traits::broker::{Broker, BrokerError};

/// Current wall clock as unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
