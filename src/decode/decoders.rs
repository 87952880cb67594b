//! Decoder implementations
//!
//! Each decoder accepts exactly one JSON shape and rejects everything else,
//! so the parser can try them in order.

use crate::error::{Error, Result};
use crate::types::ParsedRecord;
use serde_json::Value;

/// Decodes a body of one specific shape into records
pub trait RecordDecoder: Send + Sync {
    /// Decode the body, failing when it is not this decoder's shape
    fn decode(&self, body: &str) -> Result<Vec<ParsedRecord>>;
}

/// Convert one JSON value into a record; `null` becomes an empty (all-null) record
fn into_record(value: Value, position: &str) -> Result<ParsedRecord> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ParsedRecord::new()),
        other => Err(Error::malformed(format!(
            "Expected an object at {position}, found {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// JSON Array Decoder
// ============================================================================

/// Whole body is one JSON array of objects
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArrayDecoder;

impl RecordDecoder for JsonArrayDecoder {
    fn decode(&self, body: &str) -> Result<Vec<ParsedRecord>> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::malformed(format!("Failed to parse JSON: {e}")))?;

        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(Error::malformed(format!(
                    "Expected a JSON array, found {}",
                    type_name(&other)
                )))
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| into_record(item, &format!("index {i}")))
            .collect()
    }
}

// ============================================================================
// JSONL Decoder
// ============================================================================

/// JSON Lines decoder (one JSON object per line)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlDecoder;

impl RecordDecoder for JsonlDecoder {
    fn decode(&self, body: &str) -> Result<Vec<ParsedRecord>> {
        let mut records = Vec::new();

        for (line_num, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line).map_err(|e| {
                Error::malformed(format!(
                    "Failed to parse JSONL at line {}: {e}",
                    line_num + 1
                ))
            })?;

            records.push(into_record(value, &format!("line {}", line_num + 1))?);
        }

        if records.is_empty() {
            return Err(Error::malformed("No JSON lines found"));
        }

        Ok(records)
    }
}

// ============================================================================
// JSON Object Decoder
// ============================================================================

/// Whole body is a single JSON object
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectDecoder;

impl RecordDecoder for JsonObjectDecoder {
    fn decode(&self, body: &str) -> Result<Vec<ParsedRecord>> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::malformed(format!("Failed to parse JSON: {e}")))?;

        match value {
            Value::Object(map) => Ok(vec![map]),
            other => Err(Error::malformed(format!(
                "Unsupported JSON format: {}",
                type_name(&other)
            ))),
        }
    }
}
