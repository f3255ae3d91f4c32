//! Automation platform capability
//!
//! Remediation jobs run on an external automation platform. The core only
//! launches templated jobs and polls their status through
//! [`AutomationClient`]; [`AapClient`] talks to the platform's REST API and
//! [`SimulatedAutomation`] is an in-process stand-in.

pub mod aap;
pub mod simulated;

pub use aap::AapClient;
pub use simulated::SimulatedAutomation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AutomationMode, AutomationSettings};

/// Identifier assigned by the platform to a launched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Automation platform errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutomationError {
    #[error("Automation platform unreachable: {0}")]
    Unreachable(String),

    #[error("Automation platform rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Automation platform request timed out")]
    Timeout,

    #[error("Unexpected automation platform response: {0}")]
    Decode(String),
}

/// Launch and track remediation jobs.
///
/// Shared between the orchestrator's dispatch tasks, hence `&self` and
/// `Send + Sync`.
#[async_trait]
pub trait AutomationClient: Send + Sync + 'static {
    async fn launch_job(
        &self,
        template_id: u64,
        variables: serde_json::Value,
    ) -> Result<JobId, AutomationError>;

    async fn get_status(&self, job: JobId) -> Result<JobStatus, AutomationError>;

    /// Backend label for status reports.
    fn backend_name(&self) -> &'static str;
}

/// Build the client selected by `[automation].mode`.
pub fn build_client(settings: &AutomationSettings) -> Result<Arc<dyn AutomationClient>, AutomationError> {
    match settings.mode {
        AutomationMode::Simulated => Ok(Arc::new(SimulatedAutomation::new(
            settings.simulated_job_duration,
            settings.simulated_failure_rate,
        ))),
        AutomationMode::Aap => Ok(Arc::new(AapClient::new(settings)?)),
    }
}
