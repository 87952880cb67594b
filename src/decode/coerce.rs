//! Field coercion and time-key derivation
//!
//! Calendar fields are coerced to integers so that `time_id` can be derived
//! the same way the generated calendar derives it. A value that cannot be
//! coerced becomes null; the record itself is always kept.

use crate::types::{JsonValue, ParsedRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Fields coerced to integers
pub const INTEGER_FIELDS: [&str; 5] = ["year", "month", "day", "hour", "time_id"];

const BOOL_FIELDS: [&str; 1] = ["is_weekend"];
const DATETIME_FIELDS: [&str; 1] = ["datetime"];

/// Coerce calendar, flag and datetime fields in place
pub fn coerce_record(record: &mut ParsedRecord) {
    for field in INTEGER_FIELDS {
        if let Some(value) = record.get_mut(field) {
            *value = coerce_integer(value);
        }
    }
    for field in BOOL_FIELDS {
        if let Some(value) = record.get_mut(field) {
            *value = coerce_bool(value);
        }
    }
    for field in DATETIME_FIELDS {
        if let Some(value) = record.get_mut(field) {
            *value = parse_datetime_value(value)
                .map_or(Value::Null, |dt| Value::String(format_datetime(&dt)));
        }
    }
}

/// Set `time_id` from `year`, `month`, `day` and `hour`.
///
/// Returns the derived key. When a component is missing or not a valid
/// calendar value the record is left untouched.
pub fn derive_time_id(record: &mut ParsedRecord) -> Option<i64> {
    let part = |name: &str| record.get(name).and_then(JsonValue::as_i64);
    let time_id = time_id_from_parts(
        part("year")?,
        part("month")?,
        part("day")?,
        part("hour")?,
    )?;
    record.insert("time_id".to_string(), Value::from(time_id));
    Some(time_id)
}

/// `YYYYMMDDHH` as an integer, e.g. 2024-03-05 09h is `2024030509`
pub fn time_id_from_parts(year: i64, month: i64, day: i64, hour: i64) -> Option<i64> {
    if !(0..=9999).contains(&year)
        || !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
        || !(0..=23).contains(&hour)
    {
        return None;
    }
    format!("{year:04}{month:02}{day:02}{hour:02}").parse().ok()
}

/// ISO-8601 UTC with milliseconds, the format written for datetime columns
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse the timestamp layouts producers emit
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Strings via `parse_datetime`, numbers as epoch milliseconds
fn parse_datetime_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn coerce_integer(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                n.as_f64().and_then(integral).map_or(Value::Null, Value::from)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .map_or(Value::Null, Value::from)
        }
        _ => Value::Null,
    }
}

/// Whole floats only (`7.0` yes, `7.5` no)
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}

fn coerce_bool(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => n.as_f64().map_or(Value::Null, |f| Value::Bool(f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Value::Bool(true),
            "false" | "f" | "no" | "0" => Value::Bool(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}
