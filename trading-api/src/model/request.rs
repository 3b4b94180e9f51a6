use super::identity::{RequestId, SubmitterId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client's instruction to open a position.
///
/// Immutable once handed to the deal processor; the builder methods consume
/// `self` and are meant to be used while the request is still being assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    request_id: RequestId,
    submitter_id: SubmitterId,
    side: Side,
    symbol: String,
    volume: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    /// Unix millis.
    submitted_at: i64,
}

impl TradeRequest {
    /// Creates a request with a freshly generated [`RequestId`].
    pub fn new(
        submitter_id: impl Into<SubmitterId>,
        side: Side,
        symbol: impl Into<String>,
        volume: f64,
    ) -> Self {
        let submitter_id = submitter_id.into();
        Self {
            request_id: RequestId::generate(&submitter_id),
            submitter_id,
            side,
            symbol: symbol.into(),
            volume,
            stop_loss: None,
            take_profit: None,
            submitted_at: crate::now_millis(),
        }
    }

    /// Replaces the generated id with a caller-assigned one.
    pub fn with_request_id(mut self, request_id: impl Into<RequestId>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn submitter_id(&self) -> &SubmitterId {
        &self.submitter_id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.stop_loss
    }

    pub fn take_profit(&self) -> Option<f64> {
        self.take_profit
    }

    pub fn submitted_at(&self) -> i64 {
        self.submitted_at
    }
}

impl fmt::Display for TradeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} {} lots",
            self.request_id, self.submitter_id, self.side, self.symbol, self.volume
        )?;
        if let Some(sl) = self.stop_loss {
            write!(f, " SL={}", sl)?;
        }
        if let Some(tp) = self.take_profit {
            write!(f, " TP={}", tp)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_protection_levels() {
        let req = TradeRequest::new("Client-1", Side::Buy, "EURUSD", 0.1)
            .with_request_id("r-1")
            .with_stop_loss(1.08)
            .with_take_profit(1.09);

        assert_eq!(
            req.to_string(),
            "[r-1] Client-1 BUY EURUSD 0.1 lots SL=1.08 TP=1.09"
        );
    }

    #[test]
    fn test_serde_roundtrip_keeps_identity() {
        let req = TradeRequest::new("Client-2", Side::Sell, "XAUUSD", 0.5);
        let json = serde_json::to_string(&req).unwrap();
        let back: TradeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
