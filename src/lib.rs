//! PLC Healer: self-healing control loop for industrial controllers
//!
//! ## Architecture
//!
//! - **Polling monitor**: reads configured tags over a [`DeviceLink`] at a
//!   fixed interval and tracks connection state
//! - **Threshold evaluator**: pure per-tag failure-condition check
//! - **Tag store / event log**: latest values, bounded history, violation
//!   records and an ordered, bounded event stream
//! - **Chaos engine**: time-bounded injected faults (value anomalies, link
//!   timeouts and loss, simulated crashes)
//! - **Remediation orchestrator**: turns violations and operator commands
//!   into automation jobs under a per-action cooldown and retry policy
//! - **Control plane / API**: one service object, exposed over HTTP
//!
//! [`DeviceLink`]: acquisition::DeviceLink

pub mod acquisition;
pub mod api;
pub mod automation;
pub mod chaos;
pub mod config;
pub mod control_plane;
pub mod monitor;
pub mod remediation;
pub mod store;
pub mod types;

pub use config::{AppConfig, ConfigError};
pub use control_plane::ControlPlane;

pub use acquisition::{DeviceLink, LinkError, SimulatedDevice, SimulatedDeviceHandle};
pub use automation::{AapClient, AutomationClient, AutomationError, JobId, JobStatus, SimulatedAutomation};
pub use chaos::{ChaosEngine, ChaosError, InjectRequest};
pub use monitor::{ConnectionState, LinkStats, PollingMonitor};
pub use remediation::{RemediationError, RemediationOrchestrator, TriggerError};
pub use store::{EventLog, TagStore};

pub use types::{
    Event, EventType, FailureCondition, FailureType, RemediationAction, RemediationAttempt,
    Severity, TagConfig, TagValue, ValueType, Violation,
};
