use super::identity::RequestId;
use super::request::Side;
use super::result::TradeStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A completed execution as booked by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Broker deal ticket.
    pub ticket: String,
    /// The request this fill answers.
    pub request_id: RequestId,
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    /// Execution price.
    pub price: f64,
    /// Unix millis.
    pub executed_at: i64,
}

/// Category of an execution failure reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The broker could not be reached or timed out.
    Connection,
    /// Server-side policy rejection (symbol disabled, session closed, ...).
    Rejected,
    /// The broker judged the request parameters invalid.
    InvalidParams,
    /// Not enough free margin for the requested volume.
    Margin,
}

impl FailureKind {
    /// The terminal status a result takes when this failure is final.
    pub fn status(&self) -> TradeStatus {
        match self {
            FailureKind::Connection => TradeStatus::ConnectionError,
            FailureKind::Rejected => TradeStatus::Rejected,
            FailureKind::InvalidParams => TradeStatus::InvalidParams,
            FailureKind::Margin => TradeStatus::MarginError,
        }
    }
}

/// Whether retrying the same request may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Transient,
    Permanent,
}

/// A failed execution, classified once at the broker boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub disposition: Disposition,
    pub reason: String,
}

impl ExecutionFailure {
    pub fn transient(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            disposition: Disposition::Transient,
            reason: reason.into(),
        }
    }

    pub fn permanent(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            disposition: Disposition::Permanent,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.disposition == Disposition::Transient
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.kind.status(), self.disposition, self.reason)
    }
}

/// Outcome of a single broker `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Filled(Fill),
    Failed(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, ExecutionOutcome::Filled(_))
    }
}
