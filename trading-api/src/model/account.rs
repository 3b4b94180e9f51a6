use serde::{Deserialize, Serialize};

/// Snapshot of a trading account as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub login: u64,
    pub balance: f64,
    pub equity: f64,
    pub free_margin: f64,
    /// Margin level in percent.
    pub margin_level: f64,
    pub currency: String,
}

impl AccountInfo {
    pub fn new(login: u64, balance: f64, currency: impl Into<String>) -> Self {
        Self {
            login,
            balance,
            equity: balance,
            free_margin: balance,
            margin_level: 0.0,
            currency: currency.into(),
        }
    }
}
