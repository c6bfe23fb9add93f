//! Typed values per field kind: query strings and JSON bodies are brought into one canonical shape.

use crate::config::{FieldInfo, FieldKind};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Number, Value};

/// Canonical timestamp text. Fixed width, so string order equals time order.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parse a query-string value as `field`'s kind.
pub fn coerce_str(field: &FieldInfo, raw: &str) -> Result<Value, String> {
    let invalid = || format!("Invalid {}: {}", field.name, raw);
    match field.kind {
        FieldKind::Uuid => uuid::Uuid::parse_str(raw)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| invalid()),
        FieldKind::Text if field.lowercase => Ok(Value::String(raw.to_lowercase())),
        FieldKind::Text => Ok(Value::String(raw.to_string())),
        FieldKind::Int => raw.parse::<i64>().map(Value::from).map_err(|_| invalid()),
        FieldKind::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        FieldKind::Bool => match raw.to_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        FieldKind::Timestamp => parse_timestamp(raw)
            .map(|dt| Value::String(format_timestamp(dt)))
            .ok_or_else(invalid),
        FieldKind::Json => serde_json::from_str(raw).map_err(|_| invalid()),
    }
}

/// Check a JSON body value against `field`'s kind and normalise it. Numeric strings are
/// accepted for numeric fields; null passes through for every kind.
pub fn normalize_json(field: &FieldInfo, value: Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(value);
    }
    let mismatch = |expected: &str| format!("{} must be {}", field.name, expected);
    match field.kind {
        FieldKind::Json => Ok(value),
        FieldKind::Text => match value {
            Value::String(s) if field.lowercase => Ok(Value::String(s.to_lowercase())),
            Value::String(_) => Ok(value),
            _ => Err(mismatch("a string")),
        },
        FieldKind::Int => {
            if let Some(n) = value.as_i64() {
                return Ok(Value::from(n));
            }
            if let Some(f) = value.as_f64() {
                // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
                let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
                return if f.fract() == 0.0 && in_range {
                    Ok(Value::from(f as i64))
                } else {
                    Err(mismatch("an integer"))
                };
            }
            match value.as_str() {
                Some(s) => coerce_str(field, s.trim()).map_err(|_| mismatch("an integer")),
                None => Err(mismatch("an integer")),
            }
        }
        FieldKind::Float => {
            if let Some(f) = value.as_f64() {
                return Ok(Value::from(f));
            }
            match value.as_str() {
                Some(s) => coerce_str(field, s.trim()).map_err(|_| mismatch("a number")),
                None => Err(mismatch("a number")),
            }
        }
        FieldKind::Bool if value.is_boolean() => Ok(value),
        FieldKind::Bool => Err(mismatch("a boolean")),
        FieldKind::Uuid | FieldKind::Timestamp => match value.as_str() {
            Some(s) => coerce_str(field, s).map_err(|_| match field.kind {
                FieldKind::Uuid => mismatch("a valid id"),
                _ => mismatch("a valid date"),
            }),
            None => Err(mismatch("a string")),
        },
    }
}
