//! Device data acquisition
//!
//! The industrial protocol itself lives behind [`DeviceLink`]; the core only
//! needs batched reads and single-tag writes. [`SimulatedDevice`] is the
//! in-memory stand-in used for demos and tests.

pub mod simulated;

pub use simulated::{SimulatedDevice, SimulatedDeviceHandle};

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::types::TagValue;

/// Device link errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error("Timeout waiting for device")]
    Timeout,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl LinkError {
    /// Stable identifier used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::Timeout => "timeout",
            LinkError::ConnectionLost(_) => "connection_lost",
            LinkError::Protocol(_) => "protocol_error",
        }
    }
}

/// Read/write access to one controller.
///
/// Owned by the polling loop; implementations are never shared between
/// tasks, so methods take `&mut self`.
#[async_trait]
pub trait DeviceLink: Send + 'static {
    /// Read a batch of tags by device name.
    async fn read(&mut self, names: &[String]) -> Result<HashMap<String, TagValue>, LinkError>;

    /// Write one tag.
    async fn write(&mut self, name: &str, value: TagValue) -> Result<(), LinkError>;

    /// Release the underlying connection. Called once when the monitor stops.
    async fn close(&mut self) {}

    /// Human-readable label for logs.
    fn link_name(&self) -> &str;
}
