use super::execution::{ExecutionFailure, Fill};
use super::identity::{RequestId, SubmitterId};
use super::request::TradeRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a trade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradeStatus {
    Success,
    Rejected,
    InvalidParams,
    ConnectionError,
    MarginError,
    Duplicate,
    RetryExhausted,
}

impl TradeStatus {
    pub const ALL: [TradeStatus; 7] = [
        TradeStatus::Success,
        TradeStatus::Rejected,
        TradeStatus::InvalidParams,
        TradeStatus::ConnectionError,
        TradeStatus::MarginError,
        TradeStatus::Duplicate,
        TradeStatus::RetryExhausted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Success => "SUCCESS",
            TradeStatus::Rejected => "REJECTED",
            TradeStatus::InvalidParams => "INVALID_PARAMS",
            TradeStatus::ConnectionError => "CONNECTION_ERROR",
            TradeStatus::MarginError => "MARGIN_ERROR",
            TradeStatus::Duplicate => "DUPLICATE",
            TradeStatus::RetryExhausted => "RETRY_EXHAUSTED",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == TradeStatus::Success
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a trade request, written exactly once by the processor.
///
/// Ticket and price are present only on success; the error message only on
/// failure. There are no setters: a result is assembled through its
/// constructors and `with_*` stamps before it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    request_id: RequestId,
    submitter_id: SubmitterId,
    status: TradeStatus,
    ticket: Option<String>,
    price: Option<f64>,
    error: Option<String>,
    retry_count: u32,
    /// Submission order assigned by the processor at enqueue time.
    sequence: u64,
    /// Unix millis.
    completed_at: i64,
}

impl TradeResult {
    /// A successful execution of `request`.
    pub fn filled(request: &TradeRequest, fill: &Fill) -> Self {
        Self {
            request_id: request.request_id().clone(),
            submitter_id: request.submitter_id().clone(),
            status: TradeStatus::Success,
            ticket: Some(fill.ticket.clone()),
            price: Some(fill.price),
            error: None,
            retry_count: 0,
            sequence: 0,
            completed_at: crate::now_millis(),
        }
    }

    /// A failed request with the given terminal status.
    pub fn failed(request: &TradeRequest, status: TradeStatus, error: impl Into<String>) -> Self {
        Self {
            request_id: request.request_id().clone(),
            submitter_id: request.submitter_id().clone(),
            status,
            ticket: None,
            price: None,
            error: Some(error.into()),
            retry_count: 0,
            sequence: 0,
            completed_at: crate::now_millis(),
        }
    }

    /// A failed request whose status follows the broker's failure kind.
    pub fn from_failure(request: &TradeRequest, failure: &ExecutionFailure) -> Self {
        Self::failed(request, failure.kind.status(), failure.reason.clone())
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn submitter_id(&self) -> &SubmitterId {
        &self.submitter_id
    }

    pub fn status(&self) -> TradeStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn ticket(&self) -> Option<&str> {
        self.ticket.as_deref()
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn completed_at(&self) -> i64 {
        self.completed_at
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.request_id, self.status)?;
        match (&self.ticket, self.price, &self.error) {
            (Some(ticket), Some(price), _) => write!(f, " Ticket=#{} Price={:.5}", ticket, price)?,
            (_, _, Some(error)) => write!(f, " Error: {}", error)?,
            _ => {}
        }
        if self.retry_count > 0 {
            write!(f, " (retries={})", self.retry_count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::execution::FailureKind;
    use crate::model::request::Side;

    fn request() -> TradeRequest {
        TradeRequest::new("Client-1", Side::Buy, "EURUSD", 0.1).with_request_id("r-1")
    }

    #[test]
    fn test_filled_result_carries_ticket_and_price_only() {
        let req = request();
        let fill = Fill {
            ticket: "100000".into(),
            request_id: req.request_id().clone(),
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 0.1,
            price: 1.08465,
            executed_at: 0,
        };
        let result = TradeResult::filled(&req, &fill).with_retry_count(2);

        assert!(result.is_success());
        assert_eq!(result.ticket(), Some("100000"));
        assert_eq!(result.price(), Some(1.08465));
        assert_eq!(result.error(), None);
        assert_eq!(
            result.to_string(),
            "[r-1] SUCCESS Ticket=#100000 Price=1.08465 (retries=2)"
        );
    }

    #[test]
    fn test_failure_maps_kind_to_status() {
        let failure = ExecutionFailure::permanent(FailureKind::Margin, "Insufficient margin");
        let result = TradeResult::from_failure(&request(), &failure);

        assert_eq!(result.status(), TradeStatus::MarginError);
        assert_eq!(result.ticket(), None);
        assert_eq!(result.price(), None);
        assert_eq!(result.error(), Some("Insufficient margin"));
    }

    #[test]
    fn test_status_names() {
        let names: Vec<&str> = TradeStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            [
                "SUCCESS",
                "REJECTED",
                "INVALID_PARAMS",
                "CONNECTION_ERROR",
                "MARGIN_ERROR",
                "DUPLICATE",
                "RETRY_EXHAUSTED"
            ]
        );
    }
}
