//! Metric observation types

use crate::config::MetricBinding;
use crate::decode::parse_datetime;
use crate::types::{JsonValue, ParsedRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record fields that may name the observation's location
const LOCATION_FIELDS: [&str; 2] = ["location_name", "location"];

/// One published value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub namespace: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// Observations for every bound numeric field of every record.
///
/// Non-numeric and missing values are skipped. The timestamp comes from the
/// record's `datetime` when it has one, otherwise `fallback_ts`.
pub fn observations_for(
    records: &[ParsedRecord],
    bindings: &[MetricBinding],
    namespace: &str,
    default_location: &str,
    fallback_ts: DateTime<Utc>,
) -> Vec<Observation> {
    if bindings.is_empty() {
        return Vec::new();
    }

    let mut observations = Vec::new();
    for record in records {
        let location = LOCATION_FIELDS
            .iter()
            .find_map(|field| record.get(*field).and_then(JsonValue::as_str))
            .unwrap_or(default_location);
        let timestamp = record
            .get("datetime")
            .and_then(JsonValue::as_str)
            .and_then(parse_datetime)
            .unwrap_or(fallback_ts);

        for binding in bindings {
            let Some(value) = record.get(&binding.field).and_then(numeric) else {
                continue;
            };
            observations.push(Observation {
                namespace: namespace.to_string(),
                name: binding.name.clone(),
                value,
                unit: binding.unit.clone(),
                location: location.to_string(),
                timestamp,
            });
        }
    }
    observations
}

fn numeric(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok().filter(|f: &f64| f.is_finite()),
        _ => None,
    }
}
