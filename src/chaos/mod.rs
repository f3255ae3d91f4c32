//! Chaos injection
//!
//! Deliberately corrupts readings or the device link for a bounded time so
//! detection and remediation can be exercised under fault.

mod engine;

pub use engine::{ChaosEngine, ChaosStatus, InjectRequest};

use serde_json::json;
use thiserror::Error;
use tokio::time::Instant;

use crate::types::{ChaosInjection, EventType, FailureType, NewEvent};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChaosError {
    #[error("{failure_type} is already active{}", target.as_ref().map(|t| format!(" on '{t}'")).unwrap_or_default())]
    AlreadyActive {
        failure_type: FailureType,
        target: Option<String>,
    },

    #[error("Unknown tag '{0}'")]
    UnknownTag(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Injection rate {0} must be in [0, 1]")]
    InvalidRate(f64),

    #[error("No failure types configured")]
    NoFailureTypes,
}

/// `chaos_injected` event for a freshly activated injection.
pub fn injected_event(inj: &ChaosInjection, now: Instant) -> NewEvent {
    let event = NewEvent::new(
        EventType::ChaosInjected,
        json!({ "injection": inj.snapshot(now) }),
    );
    match &inj.target {
        Some(tag) => event.with_tag(tag.as_str()),
        None => event,
    }
}

/// `chaos_resolved` event for an expired injection.
pub fn resolved_event(inj: &ChaosInjection, now: Instant) -> NewEvent {
    let event = NewEvent::new(
        EventType::ChaosResolved,
        json!({
            "injection_id": inj.id,
            "failure_type": inj.failure_type,
            "target": inj.target,
            "duration_secs": inj.duration.as_secs_f64(),
            "overrun_secs": now.saturating_duration_since(inj.ends()).as_secs_f64(),
        }),
    );
    match &inj.target {
        Some(tag) => event.with_tag(tag.as_str()),
        None => event,
    }
}
