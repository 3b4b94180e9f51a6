//! Pre-execution gate.
//!
//! Catches malformed and duplicate requests before they reach the broker.
//! Checks run in a fixed order and stop at the first failure:
//! duplicate id, structure, symbol existence and tradeability, volume bounds
//! and step, stop-loss / take-profit sanity.

use log::warn;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use trading::{Broker, RequestId, TradeRequest, TradeResult, TradeStatus};

pub struct Validator {
    broker: Arc<dyn Broker>,
    seen: Mutex<HashSet<RequestId>>,
}

impl Validator {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Validates a request.
    ///
    /// # Returns
    ///
    /// * `None` if the request is clear to execute.
    /// * `Some(result)` carrying the rejection otherwise.
    pub fn validate(&self, request: &TradeRequest) -> Option<TradeResult> {
        if !self.mark_seen(request.request_id()) {
            warn!("Duplicate request detected: {}", request.request_id());
            return Some(reject(
                request,
                TradeStatus::Duplicate,
                format!("Duplicate request ID: {}", request.request_id()),
            ));
        }

        if request.submitter_id().is_empty() {
            return Some(reject(request, TradeStatus::InvalidParams, "Empty client ID"));
        }
        if request.symbol().is_empty() {
            return Some(reject(request, TradeStatus::InvalidParams, "Empty symbol"));
        }
        // Written as a negated comparison so NaN is rejected too.
        if !(request.volume() > 0.0) {
            return Some(reject(
                request,
                TradeStatus::InvalidParams,
                format!("Invalid volume: {}", request.volume()),
            ));
        }

        let spec = match self.broker.symbol_info(request.symbol()) {
            Some(spec) => spec,
            None => {
                return Some(reject(
                    request,
                    TradeStatus::InvalidParams,
                    format!("Unknown symbol: {}", request.symbol()),
                ))
            }
        };
        if !spec.is_tradeable() {
            return Some(reject(
                request,
                TradeStatus::Rejected,
                format!("Trading not allowed for: {}", request.symbol()),
            ));
        }

        if !spec.volume_in_range(request.volume()) {
            return Some(reject(
                request,
                TradeStatus::InvalidParams,
                format!(
                    "Volume {} outside range [{}, {}]",
                    request.volume(),
                    spec.min_volume(),
                    spec.max_volume()
                ),
            ));
        }
        if !spec.is_step_aligned(request.volume()) {
            return Some(reject(
                request,
                TradeStatus::InvalidParams,
                format!(
                    "Volume {} not aligned to step {}",
                    request.volume(),
                    spec.volume_step()
                ),
            ));
        }

        if let Some(sl) = request.stop_loss().filter(|sl| !(*sl > 0.0)) {
            return Some(reject(
                request,
                TradeStatus::InvalidParams,
                format!("Invalid stop loss: {}", sl),
            ));
        }
        if let Some(tp) = request.take_profit().filter(|tp| !(*tp > 0.0)) {
            return Some(reject(
                request,
                TradeStatus::InvalidParams,
                format!("Invalid take profit: {}", tp),
            ));
        }

        None
    }

    /// Records the id as seen; `false` if it already was. First caller wins.
    fn mark_seen(&self, id: &RequestId) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone())
    }

    /// Number of distinct request ids observed so far.
    pub fn seen_count(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn reject(request: &TradeRequest, status: TradeStatus, message: impl Into<String>) -> TradeResult {
    TradeResult::failed(request, status, message)
}
