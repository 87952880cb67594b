//! Record transformation ahead of writing

use crate::config::LogicalSource;
use crate::decode::{coerce_record, derive_time_id};
use crate::keys::record_surrogate_key;
use crate::types::{JsonValue, ParsedRecord};
use std::collections::HashSet;
use tracing::debug;

/// Coerce types, derive `time_id`, fill surrogate keys, then deduplicate
pub fn transform_records(source: &LogicalSource, records: Vec<ParsedRecord>) -> Vec<ParsedRecord> {
    let records = records
        .into_iter()
        .map(|mut record| {
            coerce_record(&mut record);
            derive_time_id(&mut record);
            for key in &source.surrogate_keys {
                let present = record.get(&key.field).is_some_and(|v| !v.is_null());
                if present {
                    continue;
                }
                if let Some(id) = record_surrogate_key(&record, &key.from, key.modulus) {
                    record.insert(key.field.clone(), JsonValue::from(id));
                }
            }
            record
        })
        .collect();

    dedup_records(records, &source.dedup_keys)
}

/// Drop duplicate records, keeping the first occurrence and input order.
///
/// Records are compared on `keys`, or on every field when `keys` is empty.
pub fn dedup_records(records: Vec<ParsedRecord>, keys: &[String]) -> Vec<ParsedRecord> {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);

    let kept: Vec<_> = records
        .into_iter()
        .filter(|record| seen.insert(identity(record, keys)))
        .collect();

    if kept.len() < before {
        debug!(duplicates = before - kept.len(), "Dropped duplicate records");
    }
    kept
}

fn identity(record: &ParsedRecord, keys: &[String]) -> String {
    if keys.is_empty() {
        return JsonValue::Object(record.clone()).to_string();
    }
    let values: Vec<&JsonValue> = keys
        .iter()
        .map(|k| record.get(k).unwrap_or(&JsonValue::Null))
        .collect();
    serde_json::to_string(&values).unwrap_or_default()
}
