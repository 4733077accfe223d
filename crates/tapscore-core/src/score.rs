//! Client-reported scores.

use serde_json::Value;

use crate::{DomainError, DomainResult};

/// A client-reported score.
///
/// Scores are client-authoritative: no bounds and no sign check are applied.
pub type Score = i64;

/// Converts a JSON payload into a score the way the browser client's
/// `Number(...)` coercion would.
///
/// - integers are taken as-is
/// - finite fractions are truncated toward zero
/// - strings holding a number (surrounding whitespace allowed) are parsed,
///   and an empty string counts as 0
/// - booleans map to 0 and 1, `null` to 0
///
/// Anything else (objects, arrays, non-numeric strings, values outside the
/// `i64` range) is rejected.
pub fn coerce_score(value: &Value) -> DomainResult<Score> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            n.as_f64()
                .and_then(truncate)
                .ok_or_else(|| invalid(value))
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(i);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(truncate)
                .ok_or_else(|| invalid(value))
        }
        Value::Bool(b) => Ok(Score::from(*b)),
        Value::Null => Ok(0),
        Value::Array(_) | Value::Object(_) => Err(invalid(value)),
    }
}

fn truncate(f: f64) -> Option<Score> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as Score)
    } else {
        None
    }
}

fn invalid(value: &Value) -> DomainError {
    DomainError::InvalidFieldValue {
        field: "score".to_string(),
        value: value.to_string(),
        expected: "a number".to_string(),
    }
}
