//! In-memory state shared between the polling loop and its readers
//!
//! - [`TagStore`]: latest values, bounded history and violations
//! - [`EventLog`]: bounded, ordered event record with subscriptions

pub mod event_log;
pub mod tag_store;

pub use event_log::{EventLog, EventSubscription};
pub use tag_store::{TagSnapshot, TagStore, ViolationChanges};
