//! Remediation orchestration
//!
//! Turns violations and operator commands into automation jobs, under a
//! per-action cooldown and a bounded automatic retry policy.

pub mod cooldown;
mod orchestrator;

pub use cooldown::Cooldown;
pub use orchestrator::{
    ActionStatus, DeferredViolation, OrchestratorSettings, RemediationOrchestrator,
    RemediationStatus,
};

use thiserror::Error;

use crate::automation::{AutomationError, JobId};
use crate::types::RemediationAction;

/// Why one dispatch of an attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemediationError {
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] AutomationError),

    #[error("job {job} failed: {reason}")]
    JobFailed { job: JobId, reason: String },

    #[error("shutdown")]
    Shutdown,
}

impl RemediationError {
    /// Stable identifier used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            RemediationError::Dispatch(_) => "dispatch_error",
            RemediationError::JobFailed { .. } => "job_failed",
            RemediationError::Shutdown => "shutdown",
        }
    }
}

/// Why a trigger request was refused. Refused requests are never queued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriggerError {
    #[error("{action} is cooling down ({remaining_secs:.1}s remaining)")]
    CooldownActive {
        action: RemediationAction,
        remaining_secs: f64,
    },

    #[error("{action} already has attempt {attempt_id} in flight")]
    InFlight {
        action: RemediationAction,
        attempt_id: u64,
    },

    #[error("no job template configured for {0}")]
    TemplateMissing(RemediationAction),

    #[error("remediation is shutting down")]
    ShuttingDown,
}
