//! Chaos injection records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use super::TagValue;

/// Kinds of fault the chaos engine can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ValueAnomaly,
    NetworkTimeout,
    ConnectionLoss,
    ServiceCrash,
}

impl FailureType {
    pub const ALL: [FailureType; 4] = [
        FailureType::ValueAnomaly,
        FailureType::NetworkTimeout,
        FailureType::ConnectionLoss,
        FailureType::ServiceCrash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::ValueAnomaly => "value_anomaly",
            FailureType::NetworkTimeout => "network_timeout",
            FailureType::ConnectionLoss => "connection_loss",
            FailureType::ServiceCrash => "service_crash",
        }
    }

    pub fn parse(s: &str) -> Option<FailureType> {
        FailureType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether the injection needs a target tag.
    pub fn is_tag_scoped(&self) -> bool {
        matches!(self, FailureType::ValueAnomaly)
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-bounded injected fault.
///
/// `active` is never stored: it is recomputed from `started` and `duration`
/// whenever it is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosInjection {
    pub id: u64,
    pub failure_type: FailureType,
    pub started_at: DateTime<Utc>,
    pub started: Instant,
    pub duration: Duration,
    /// `None` means link-wide.
    pub target: Option<String>,
    /// Replacement value for value anomalies.
    pub injected_value: Option<TagValue>,
    pub manual: bool,
}

impl ChaosInjection {
    pub fn ends(&self) -> Instant {
        self.started + self.duration
    }

    pub fn is_active(&self, now: Instant) -> bool {
        now < self.ends()
    }

    pub fn snapshot(&self, now: Instant) -> InjectionSnapshot {
        InjectionSnapshot {
            id: self.id,
            failure_type: self.failure_type,
            started_at: self.started_at,
            duration_secs: self.duration.as_secs_f64(),
            remaining_secs: self.ends().saturating_duration_since(now).as_secs_f64(),
            target: self.target.clone(),
            injected_value: self.injected_value,
            manual: self.manual,
            active: self.is_active(now),
        }
    }
}

/// Serializable view of an injection at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionSnapshot {
    pub id: u64,
    pub failure_type: FailureType,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub remaining_secs: f64,
    pub target: Option<String>,
    pub injected_value: Option<TagValue>,
    pub manual: bool,
    pub active: bool,
}
