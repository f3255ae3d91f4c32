//! Tag definitions, values and readings
//!
//! A tag is a named, typed point of data exposed by the monitored controller.
//! [`TagConfig`] is the validated, immutable form built from `[tags.<key>]`
//! sections of the config file; [`TagValue`] is the dynamically-typed value
//! carried over the device link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::RemediationAction;

// ============================================================================
// Values
// ============================================================================

/// Declared value type of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    #[serde(alias = "int")]
    Integer,
    Float,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
        }
    }
}

/// A single tag value as read from (or written to) the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl TagValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TagValue::Bool(_) => ValueType::Bool,
            TagValue::Integer(_) => ValueType::Integer,
            TagValue::Float(_) => ValueType::Float,
        }
    }

    /// Convert to the declared type of a tag.
    ///
    /// Integers widen to floats; floats narrow to integers only when they
    /// carry no fractional part. Booleans never convert to or from numbers.
    /// Non-finite floats are rejected.
    pub fn coerce(self, target: ValueType) -> Option<TagValue> {
        match (self, target) {
            (TagValue::Bool(b), ValueType::Bool) => Some(TagValue::Bool(b)),
            (TagValue::Integer(i), ValueType::Integer) => Some(TagValue::Integer(i)),
            (TagValue::Integer(i), ValueType::Float) => Some(TagValue::Float(i as f64)),
            (TagValue::Float(x), ValueType::Float) if x.is_finite() => Some(TagValue::Float(x)),
            (TagValue::Float(x), ValueType::Integer)
                if x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64 =>
            {
                Some(TagValue::Integer(x as i64))
            }
            _ => None,
        }
    }

    /// Numeric view used for range comparisons. `None` for booleans.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Bool(_) => None,
            TagValue::Integer(i) => Some(*i as f64),
            TagValue::Float(x) => Some(*x),
        }
    }

    /// Parse a raw TOML value from the config file.
    pub fn from_toml(value: &toml::Value) -> Option<TagValue> {
        match value {
            toml::Value::Boolean(b) => Some(TagValue::Bool(*b)),
            toml::Value::Integer(i) => Some(TagValue::Integer(*i)),
            toml::Value::Float(x) => Some(TagValue::Float(*x)),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(b) => write!(f, "{b}"),
            TagValue::Integer(i) => write!(f, "{i}"),
            TagValue::Float(x) => write!(f, "{x}"),
        }
    }
}

// ============================================================================
// Failure conditions
// ============================================================================

/// Failure condition with its parameters, already validated for the tag type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCondition {
    /// Violates when the value equals `failure_value`.
    Equals { failure_value: TagValue },
    /// Violates when the value differs from `failure_value`.
    NotEquals { failure_value: TagValue },
    /// Violates when the value is below `low` or above `high`.
    OutsideRange { low: f64, high: f64 },
    /// Violates when the value is below `threshold`.
    Below { threshold: f64 },
    /// Violates when the value is above `threshold`.
    Above { threshold: f64 },
}

impl FailureCondition {
    pub fn name(&self) -> &'static str {
        match self {
            FailureCondition::Equals { .. } => "equals",
            FailureCondition::NotEquals { .. } => "not_equals",
            FailureCondition::OutsideRange { .. } => "outside_range",
            FailureCondition::Below { .. } => "below",
            FailureCondition::Above { .. } => "above",
        }
    }
}

impl fmt::Display for FailureCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCondition::Equals { failure_value } => write!(f, "equals {failure_value}"),
            FailureCondition::NotEquals { failure_value } => {
                write!(f, "not_equals {failure_value}")
            }
            FailureCondition::OutsideRange { low, high } => {
                write!(f, "outside_range [{low}, {high}]")
            }
            FailureCondition::Below { threshold } => write!(f, "below {threshold}"),
            FailureCondition::Above { threshold } => write!(f, "above {threshold}"),
        }
    }
}

// ============================================================================
// Tag configuration
// ============================================================================

/// Validated configuration for one monitored tag. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagConfig {
    /// Config key; the tag's identity everywhere inside the core.
    pub key: String,
    /// Device-side tag path read over the link.
    pub device_name: String,
    pub value_type: ValueType,
    pub nominal: TagValue,
    pub condition: FailureCondition,
    /// Action dispatched when this tag violates.
    pub remediation_action: RemediationAction,
}

impl TagConfig {
    /// A value guaranteed to trip this tag's failure condition, or `None` when
    /// no value of the tag's type can (an integer range spanning all of i64).
    ///
    /// Used by value-anomaly chaos injections. Numeric anomalies sit 100 units
    /// past the relevant threshold, further for thresholds too large for a
    /// 100-unit step to register as an f64.
    pub fn anomalous_value(&self) -> Option<TagValue> {
        let integer = self.value_type == ValueType::Integer;
        let below = |limit: f64| {
            let x = limit - step_past(limit);
            if integer {
                int_below(limit, x).map(TagValue::Integer)
            } else {
                Some(TagValue::Float(x))
            }
        };
        let above = |limit: f64| {
            let x = limit + step_past(limit);
            if integer {
                int_above(limit, x).map(TagValue::Integer)
            } else {
                Some(TagValue::Float(x))
            }
        };
        match &self.condition {
            FailureCondition::Equals { failure_value } => Some(*failure_value),
            FailureCondition::NotEquals { failure_value } => Some(match failure_value {
                TagValue::Bool(b) => TagValue::Bool(!b),
                TagValue::Integer(i) => TagValue::Integer(i.checked_add(100).unwrap_or(i - 100)),
                TagValue::Float(x) => TagValue::Float(x + step_past(*x)),
            }),
            FailureCondition::OutsideRange { low, high } => below(*low).or_else(|| above(*high)),
            FailureCondition::Below { threshold } => below(*threshold),
            FailureCondition::Above { threshold } => above(*threshold),
        }
    }
}

/// Distance past `limit` that is always representable as a change in f64.
fn step_past(limit: f64) -> f64 {
    100.0_f64.max(limit.abs() * 4.0 * f64::EPSILON)
}

/// `x` floored to an i64 that still compares below `limit`, if one exists.
fn int_below(limit: f64, x: f64) -> Option<i64> {
    let x = x.floor();
    // -2^63 is exact in f64; anything smaller does not fit
    if x < i64::MIN as f64 {
        return None;
    }
    let i = x as i64;
    ((i as f64) < limit).then_some(i)
}

/// `x` ceiled to an i64 that still compares above `limit`, if one exists.
fn int_above(limit: f64, x: f64) -> Option<i64> {
    let x = x.ceil();
    // i64::MAX rounds up to 2^63 in f64, which does not fit
    if x >= i64::MAX as f64 {
        return None;
    }
    let i = x as i64;
    ((i as f64) > limit).then_some(i)
}

// ============================================================================
// Readings
// ============================================================================

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Real,
    ChaosInjected,
}

/// One tag value sampled on one poll tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagReading {
    pub tag: String,
    pub value: TagValue,
    pub timestamp: DateTime<Utc>,
    pub provenance: Provenance,
}
