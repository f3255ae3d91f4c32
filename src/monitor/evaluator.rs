//! Threshold evaluation
//!
//! Pure decision: does a value breach a tag's failure condition? Configs are
//! validated at load, so evaluation has no error path.

use crate::types::{FailureCondition, TagConfig, TagValue};

/// `true` if `value` violates the tag's failure condition.
///
/// `value` is expected to already be coerced to the tag's declared type.
/// Equality compares typed values; range conditions compare numerically.
/// A bool reaching a range condition (rejected at load) never violates.
pub fn evaluate(config: &TagConfig, value: &TagValue) -> bool {
    match &config.condition {
        FailureCondition::Equals { failure_value } => values_equal(value, failure_value),
        FailureCondition::NotEquals { failure_value } => !values_equal(value, failure_value),
        FailureCondition::OutsideRange { low, high } => {
            value.as_f64().is_some_and(|x| x < *low || x > *high)
        }
        FailureCondition::Below { threshold } => value.as_f64().is_some_and(|x| x < *threshold),
        FailureCondition::Above { threshold } => value.as_f64().is_some_and(|x| x > *threshold),
    }
}

fn values_equal(a: &TagValue, b: &TagValue) -> bool {
    match (a, b) {
        (TagValue::Bool(x), TagValue::Bool(y)) => x == y,
        (TagValue::Integer(x), TagValue::Integer(y)) => x == y,
        (TagValue::Bool(_), _) | (_, TagValue::Bool(_)) => false,
        _ => a.as_f64() == b.as_f64(),
    }
}
