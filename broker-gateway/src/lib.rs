//! # Broker Gateway
//!
//! Implementations of [`trading::Broker`].
//!
//! ## Modules
//! - `paper`: An in-process simulated trade server with latency, random
//!   connection failures, server-side checks and a margin ledger.

pub mod paper;

pub use paper::{PaperBroker, DEMO_LOGIN};
