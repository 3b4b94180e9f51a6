//! Broker-supplied metadata about a tradeable symbol.

use serde::{Deserialize, Serialize};

/// Tolerance applied to the volume / step ratio when checking lot alignment.
pub const STEP_TOLERANCE: f64 = 1e-6;

/// Instrument specification as returned by a symbol lookup.
///
/// Read-only to the deal processor and never cached beyond a single validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    symbol: String,
    bid: f64,
    ask: f64,
    min_volume: f64,
    max_volume: f64,
    volume_step: f64,
    /// Price decimal places (5 for EURUSD).
    digits: u32,
    tradeable: bool,
}

impl InstrumentSpec {
    pub fn new(
        symbol: impl Into<String>,
        bid: f64,
        ask: f64,
        min_volume: f64,
        max_volume: f64,
        volume_step: f64,
        digits: u32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            bid,
            ask,
            min_volume,
            max_volume,
            volume_step,
            digits,
            tradeable: true,
        }
    }

    pub fn with_tradeable(mut self, tradeable: bool) -> Self {
        self.tradeable = tradeable;
        self
    }

    /// Returns a copy with bid and ask shifted by `delta`.
    pub fn shifted(&self, delta: f64) -> Self {
        let mut spec = self.clone();
        spec.bid += delta;
        spec.ask += delta;
        spec
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bid(&self) -> f64 {
        self.bid
    }

    pub fn ask(&self) -> f64 {
        self.ask
    }

    pub fn min_volume(&self) -> f64 {
        self.min_volume
    }

    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    pub fn volume_step(&self) -> f64 {
        self.volume_step
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn is_tradeable(&self) -> bool {
        self.tradeable
    }

    pub fn volume_in_range(&self, volume: f64) -> bool {
        volume >= self.min_volume && volume <= self.max_volume
    }

    /// Whether `volume` is a whole multiple of the volume step.
    ///
    /// A non-positive step places no alignment constraint.
    pub fn is_step_aligned(&self, volume: f64) -> bool {
        if self.volume_step <= 0.0 {
            return true;
        }
        let steps = volume / self.volume_step;
        (steps - steps.round()).abs() <= STEP_TOLERANCE
    }
}
