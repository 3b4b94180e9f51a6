use deal_processor::DealProcessor;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use trading::{Side, SubmitterId, TradeRequest, TradeResult};

const SYMBOLS: [&str; 6] = ["EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD", "XAUUSD"];
const BAD_REQUEST_RATE: f64 = 0.10;
const PROTECTED_RATE: f64 = 0.40;
/// Stop loss / take profit distance as a share of the reference price.
const PROTECTION_OFFSET: f64 = 0.005;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub requests: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub send_bad_requests: bool,
    pub seed: Option<u64>,
}

/// A trading client submitting requests from its own thread.
///
/// Results come back through the processor's completion callback and are
/// collected for later inspection.
pub struct ClientSimulator {
    config: ClientConfig,
    submitter: SubmitterId,
    rng: StdRng,
    results: Arc<Mutex<Vec<TradeResult>>>,
}

impl ClientSimulator {
    pub fn new(mut config: ClientConfig) -> Self {
        config.max_delay_ms = config.max_delay_ms.max(config.min_delay_ms);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            submitter: SubmitterId::new(config.client_id.clone()),
            config,
            rng,
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> &SubmitterId {
        &self.submitter
    }

    /// Submits the configured number of requests, pausing between each.
    ///
    /// Returns how many the processor accepted.
    pub fn run(&mut self, processor: &DealProcessor) -> usize {
        let mut accepted = 0;
        for _ in 0..self.config.requests {
            let request =
                if self.config.send_bad_requests && self.rng.gen::<f64>() < BAD_REQUEST_RATE {
                    self.generate_bad_request()
                } else {
                    self.generate_request()
                };

            let results = self.results.clone();
            let submitted = processor.submit(
                request,
                Some(Box::new(move |result: &TradeResult| {
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(result.clone());
                })),
            );
            match submitted {
                Ok(()) => accepted += 1,
                Err(e) => warn!("{}: {}", self.submitter, e),
            }

            let delay = self
                .rng
                .gen_range(self.config.min_delay_ms..=self.config.max_delay_ms);
            thread::sleep(Duration::from_millis(delay));
        }
        debug!("{} finished submitting ({} accepted)", self.submitter, accepted);
        accepted
    }

    /// Results delivered so far, in completion order.
    pub fn results(&self) -> Vec<TradeResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn generate_request(&mut self) -> TradeRequest {
        let symbol = SYMBOLS[self.rng.gen_range(0..SYMBOLS.len())];
        let side = if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };
        // 0.01 to 0.50 lots
        let volume = self.rng.gen_range(1..=50) as f64 * 0.01;

        let request = TradeRequest::new(self.submitter.clone(), side, symbol, volume);
        if self.rng.gen::<f64>() >= PROTECTED_RATE {
            return request;
        }

        let reference = match symbol {
            "XAUUSD" => 2035.0,
            "USDJPY" => 149.0,
            _ => 1.0,
        };
        let offset = reference * PROTECTION_OFFSET;
        let (stop_loss, take_profit) = match side {
            Side::Buy => (reference - offset, reference + offset),
            Side::Sell => (reference + offset, reference - offset),
        };
        request
            .with_stop_loss(stop_loss)
            .with_take_profit(take_profit)
    }

    /// One of four malformed requests the processor must turn down.
    fn generate_bad_request(&mut self) -> TradeRequest {
        let submitter = self.submitter.clone();
        match self.rng.gen_range(0..4) {
            0 => TradeRequest::new(submitter, Side::Buy, "INVALID", 0.1),
            1 => TradeRequest::new(submitter, Side::Sell, "EURUSD", 0.0),
            2 => TradeRequest::new(submitter, Side::Buy, "EURUSD", 999.0),
            _ => TradeRequest::new(submitter, Side::Sell, "GBPUSD", 0.1).with_stop_loss(-1.0),
        }
    }
}
