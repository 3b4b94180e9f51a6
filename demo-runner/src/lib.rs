//! # Demo Runner
//!
//! Drives the deal processor with simulated clients against the paper broker.
//!
//! ## Modules
//! - `args`: Command line interface.
//! - `client`: Client threads generating good and deliberately bad requests.
//! - `scenario`: The normal and burst load profiles and the run loop.
//! - `report`: Timing and execution summary rendering.

pub mod args;
pub mod client;
pub mod report;
pub mod scenario;
