//! Threshold violation records

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TagValue;

/// An episode during which a tag breached its failure condition.
///
/// A violation opens once and resolves once; a later breach of the same tag
/// opens a new record with a new id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub id: u64,
    pub tag: String,
    /// Condition name (`outside_range`, ...).
    pub condition: String,
    /// Human-readable condition with its parameters.
    pub condition_detail: String,
    pub observed_value: TagValue,
    pub nominal: TagValue,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Recomputed from `resolved_at` by the tag store on every tick.
    pub active: bool,
}

impl Violation {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}
