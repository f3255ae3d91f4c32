//! API route handlers
//!
//! Thin adapters from HTTP to [`ControlPlane`](crate::control_plane::ControlPlane)
//! methods. All handlers return the shared envelope.

mod chaos;
mod events;
mod remediation;
mod status;
mod tags;

pub use chaos::*;
pub use events::*;
pub use remediation::*;
pub use status::*;
pub use tags::*;

use serde::Deserialize;

/// Default and ceiling for `limit` query parameters.
const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}
