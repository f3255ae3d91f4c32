//! Event log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every notable thing the core records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ConnectionLost,
    ConnectionRestored,
    ThresholdViolation,
    ViolationResolved,
    ChaosInjected,
    ChaosResolved,
    RemediationTriggered,
    RemediationCompleted,
    RemediationFailed,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::ConnectionLost,
        EventType::ConnectionRestored,
        EventType::ThresholdViolation,
        EventType::ViolationResolved,
        EventType::ChaosInjected,
        EventType::ChaosResolved,
        EventType::RemediationTriggered,
        EventType::RemediationCompleted,
        EventType::RemediationFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ConnectionLost => "connection_lost",
            EventType::ConnectionRestored => "connection_restored",
            EventType::ThresholdViolation => "threshold_violation",
            EventType::ViolationResolved => "violation_resolved",
            EventType::ChaosInjected => "chaos_injected",
            EventType::ChaosResolved => "chaos_resolved",
            EventType::RemediationTriggered => "remediation_triggered",
            EventType::RemediationCompleted => "remediation_completed",
            EventType::RemediationFailed => "remediation_failed",
        }
    }

    /// Severity used when the caller does not pick one explicitly.
    pub fn default_severity(&self) -> Severity {
        match self {
            EventType::ConnectionLost | EventType::RemediationFailed => Severity::Error,
            EventType::ThresholdViolation | EventType::ChaosInjected => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Parse the wire name (`threshold_violation`, ...).
    pub fn parse(s: &str) -> Option<EventType> {
        EventType::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// One entry in the event log.
///
/// `id` is assigned by the log on append and is strictly increasing for the
/// life of the process, including across evictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub severity: Severity,
    pub tag: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// An event before the log has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub severity: Severity,
    pub tag: Option<String>,
    pub payload: serde_json::Value,
}

impl NewEvent {
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            tag: None,
            payload,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_round_trip_through_parse() {
        for t in EventType::ALL {
            assert_eq!(EventType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EventType::parse("tag_read"), None);
    }

    #[test]
    fn serde_name_matches_as_str() {
        let json = serde_json::to_string(&EventType::RemediationFailed).unwrap();
        assert_eq!(json, "\"remediation_failed\"");
    }
}
