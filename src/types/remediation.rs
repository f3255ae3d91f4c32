//! Remediation actions and attempt records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::automation::JobId;

/// Corrective actions the automation platform can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    Stop,
    Reset,
    Restart,
    GatherMetrics,
}

impl RemediationAction {
    pub const ALL: [RemediationAction; 4] = [
        RemediationAction::Stop,
        RemediationAction::Reset,
        RemediationAction::Restart,
        RemediationAction::GatherMetrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationAction::Stop => "stop",
            RemediationAction::Reset => "reset",
            RemediationAction::Restart => "restart",
            RemediationAction::GatherMetrics => "gather_metrics",
        }
    }

    pub fn parse(s: &str) -> Option<RemediationAction> {
        RemediationAction::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Job template key as named on the automation platform.
    pub fn template_key(&self) -> String {
        format!("emergency_{}", self.as_str())
    }

    /// Accepts either the bare action (`reset`) or its template key
    /// (`emergency_reset`).
    pub fn from_template_key(s: &str) -> Option<RemediationAction> {
        RemediationAction::parse(s.strip_prefix("emergency_").unwrap_or(s))
    }
}

impl Default for RemediationAction {
    fn default() -> Self {
        RemediationAction::Reset
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one remediation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Created, job not yet accepted by the platform.
    Pending,
    /// Job accepted; awaiting a terminal status.
    Running,
    Succeeded,
    Failed,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Succeeded | AttemptStatus::Failed)
    }
}

/// What caused an attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptTrigger {
    Violation { tag: String },
    Manual { tag: Option<String> },
}

impl AttemptTrigger {
    pub fn tag(&self) -> Option<&str> {
        match self {
            AttemptTrigger::Violation { tag } => Some(tag),
            AttemptTrigger::Manual { tag } => tag.as_deref(),
        }
    }
}

/// One remediation attempt. Mutated only by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationAttempt {
    pub id: u64,
    pub action: RemediationAction,
    pub trigger: AttemptTrigger,
    pub triggered_at: DateTime<Utc>,
    pub job_id: Option<JobId>,
    pub status: AttemptStatus,
    /// Automatic retries performed after failed dispatches or failed jobs.
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Per-action view of the orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Idle,
    Triggered,
    AwaitingJob,
    Completed,
    Failed,
}
