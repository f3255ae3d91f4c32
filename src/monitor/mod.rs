//! Detection side of the loop: threshold evaluation and the polling monitor

pub mod evaluator;
mod polling;

pub use evaluator::evaluate;
pub use polling::{ConnectionState, LinkStats, PollingMonitor};
