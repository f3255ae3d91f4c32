//! Shared data structures for the monitoring and self-healing core
//!
//! - Tags: TagConfig, TagValue, TagReading (what is sampled from the device)
//! - Violations: breaches of a tag's failure condition
//! - Events: the ordered record of everything notable
//! - Remediation: actions and attempt records
//! - Chaos: injected faults

mod tag;
mod violation;
mod event;
mod remediation;
mod chaos;

pub use tag::*;
pub use violation::*;
pub use event::*;
pub use remediation::*;
pub use chaos::*;
