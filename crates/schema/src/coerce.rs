//! Value coercion rules, one per [`FieldKind`].
//!
//! Every function here is pure and usable on its own, so a coercion rule
//! can be tested without building a contract.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Number, Value};

use crate::contract::{DatePolicy, FieldKind};
use crate::validate::ErrorReason;

/// Date layouts, tried in order. First match wins.
pub const DATE_LAYOUTS: [&str; 3] = ["%m/%d/%Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Date-time layouts accepted by date fields after [`DATE_LAYOUTS`].
pub const DATE_TIME_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub const TIMESTAMP_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

pub const TIME_LAYOUTS: [&str; 4] = ["%H:%M:%S", "%I:%M:%S%p", "%I:%M:%S %p", "%H:%M"];

/// Why a value could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoerceError {
    pub reason: ErrorReason,
    pub message: String,
}

impl CoerceError {
    fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    fn type_mismatch(expected: &str, value: &Value) -> Self {
        Self::new(
            ErrorReason::TypeMismatch,
            format!("expected {expected}, found {}", describe(value)),
        )
    }
}

/// Null, or a string with nothing but whitespace.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Coerces `value` to `kind`. Blank input always yields null; whether that
/// is acceptable is up to the caller.
pub fn coerce(kind: FieldKind, value: &Value) -> Result<Value, CoerceError> {
    if is_blank(value) {
        return Ok(Value::Null);
    }
    match kind {
        FieldKind::Text => coerce_text(value),
        FieldKind::Identifier => coerce_identifier(value),
        FieldKind::Email => coerce_email(value),
        FieldKind::Integer => Ok(coerce_integer(value)?.map_or(Value::Null, Value::from)),
        FieldKind::Float => match coerce_float(value)? {
            None => Ok(Value::Null),
            Some(f) => Number::from_f64(f).map(Value::Number).ok_or_else(|| {
                CoerceError::new(
                    ErrorReason::UnparseableNumber,
                    format!("{} is not a finite number", describe(value)),
                )
            }),
        },
        FieldKind::Date(policy) => temporal(
            policy,
            value,
            "date",
            scalar_text(value)
                .as_deref()
                .and_then(parse_date)
                .map(|d| d.format("%Y-%m-%d").to_string()),
        ),
        FieldKind::Time(policy) => temporal(
            policy,
            value,
            "time",
            scalar_text(value)
                .as_deref()
                .and_then(parse_time)
                .map(|t| t.format("%H:%M:%S").to_string()),
        ),
        FieldKind::Timestamp(policy) => temporal(
            policy,
            value,
            "timestamp",
            scalar_text(value)
                .as_deref()
                .and_then(parse_timestamp)
                .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
        ),
    }
}

fn temporal(
    policy: DatePolicy,
    raw: &Value,
    what: &str,
    parsed: Option<String>,
) -> Result<Value, CoerceError> {
    match (parsed, policy) {
        (Some(text), _) => Ok(Value::String(text)),
        (None, DatePolicy::Lenient) => Ok(Value::Null),
        (None, DatePolicy::Strict) => Err(CoerceError::new(
            ErrorReason::UnparseableDate,
            format!("{} matches no known {what} layout", describe(raw)),
        )),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn coerce_text(value: &Value) -> Result<Value, CoerceError> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err(CoerceError::type_mismatch("text", value)),
    }
}

pub fn coerce_identifier(value: &Value) -> Result<Value, CoerceError> {
    match value {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64().and_then(integral) {
            Some(i) => Ok(Value::from(i)),
            None => Err(CoerceError::type_mismatch("an integral identifier", value)),
        },
        _ => Err(CoerceError::type_mismatch("an identifier", value)),
    }
}

pub fn coerce_email(value: &Value) -> Result<Value, CoerceError> {
    match value {
        Value::String(s) if is_email(s.trim()) => Ok(Value::String(s.trim().to_string())),
        _ => Err(CoerceError::type_mismatch("an email address", value)),
    }
}

/// `local@domain.tld` shape check. Not a full RFC 5322 parser.
pub fn is_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || domain.contains("..") {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty() && !host.starts_with('.') && tld.len() >= 2
        }
        None => false,
    }
}

/// Keeps ASCII digits, sign characters and the decimal point.
///
/// ```rust
/// use schema::strip_numeric;
///
/// assert_eq!(strip_numeric("$1,234.50"), "1234.50");
/// assert_eq!(strip_numeric("n/a"), "");
/// ```
pub fn strip_numeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        .collect()
}

/// Float coercion. `Ok(None)` when nothing numeric is left after stripping.
pub fn coerce_float(value: &Value) -> Result<Option<f64>, CoerceError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| CoerceError::type_mismatch("a number", value)),
        Value::String(s) => {
            let stripped = strip_numeric(s);
            if stripped.is_empty() {
                return Ok(None);
            }
            stripped.parse::<f64>().map(Some).map_err(|_| {
                CoerceError::new(
                    ErrorReason::UnparseableNumber,
                    format!("{} is not a number", describe(value)),
                )
            })
        }
        _ => Err(CoerceError::type_mismatch("a number", value)),
    }
}

/// Integer coercion. Fractional values are a type mismatch.
pub fn coerce_integer(value: &Value) -> Result<Option<i64>, CoerceError> {
    let fractional = || CoerceError::type_mismatch("an integer", value);
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n.as_f64().and_then(integral).map(Some).ok_or_else(fractional),
        },
        Value::String(s) => {
            let stripped = strip_numeric(s);
            if stripped.is_empty() {
                return Ok(None);
            }
            if let Ok(i) = stripped.parse::<i64>() {
                return Ok(Some(i));
            }
            match stripped.parse::<f64>() {
                Ok(f) => integral(f).map(Some).ok_or_else(fractional),
                Err(_) => Err(CoerceError::new(
                    ErrorReason::UnparseableNumber,
                    format!("{} is not a number", describe(value)),
                )),
            }
        }
        Value::Null => Ok(None),
        _ => Err(CoerceError::type_mismatch("an integer", value)),
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e18).then_some(f as i64)
}

/// Parses a calendar date. Stray braces around the value are ignored.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text
        .trim()
        .trim_matches(|c| c == '{' || c == '}')
        .trim();
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
        .or_else(|| {
            DATE_TIME_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
                .map(|ts| ts.date())
        })
}

/// Parses a time of day; `3:19:22` is read as `03:19:22`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    let padded;
    let text = if text.find(':') == Some(1) && text.starts_with(|c: char| c.is_ascii_digit()) {
        padded = format!("0{text}");
        padded.as_str()
    } else {
        text
    };
    TIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveTime::parse_from_str(text, layout).ok())
}

/// Parses a timestamp. A bare date reads as midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            DATE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("'{s}'"),
        Value::Array(_) => "an array".into(),
        Value::Object(_) => "an object".into(),
    }
}
