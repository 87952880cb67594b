//! Shape-detecting record parser

use super::decoders::{JsonArrayDecoder, JsonObjectDecoder, JsonlDecoder, RecordDecoder};
use crate::error::{Error, Result};
use crate::types::ParsedRecord;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// JSON layout a raw object was recognized as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    /// `[{...}, {...}]`
    JsonArray,
    /// One object per line
    Ndjson,
    /// `{...}`
    JsonObject,
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputShape::JsonArray => "JSON array",
            InputShape::Ndjson => "NDJSON",
            InputShape::JsonObject => "single JSON object",
        };
        f.write_str(name)
    }
}

/// Result of parsing one raw object
#[derive(Debug, Clone)]
pub struct ParsedObject {
    /// Shape that matched
    pub shape: InputShape,
    /// Records in input order, all-null rows removed
    pub records: Vec<ParsedRecord>,
    /// Number of all-null rows removed
    pub dropped_null_rows: usize,
}

/// Parses raw object bodies, trying array, then NDJSON, then single object
pub struct RecordParser {
    decoders: Vec<(InputShape, Box<dyn RecordDecoder>)>,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shapes: Vec<_> = self.decoders.iter().map(|(shape, _)| *shape).collect();
        f.debug_struct("RecordParser").field("shapes", &shapes).finish()
    }
}

impl RecordParser {
    /// Create a parser with the standard shape order
    pub fn new() -> Self {
        Self {
            decoders: vec![
                (
                    InputShape::JsonArray,
                    Box::new(JsonArrayDecoder) as Box<dyn RecordDecoder>,
                ),
                (
                    InputShape::Ndjson,
                    Box::new(JsonlDecoder) as Box<dyn RecordDecoder>,
                ),
                (
                    InputShape::JsonObject,
                    Box::new(JsonObjectDecoder) as Box<dyn RecordDecoder>,
                ),
            ],
        }
    }

    /// Parse a body into records
    pub fn parse(&self, bytes: &[u8]) -> Result<Vec<ParsedRecord>> {
        Ok(self.parse_detailed(bytes)?.records)
    }

    /// Parse a body, reporting the matched shape and dropped rows.
    ///
    /// Fails with `MalformedInput` only when no shape applies.
    pub fn parse_detailed(&self, bytes: &[u8]) -> Result<ParsedObject> {
        let body = std::str::from_utf8(bytes)
            .map_err(|e| Error::malformed(format!("Body is not valid UTF-8: {e}")))?;
        let body = body.trim_start_matches('\u{feff}');

        let mut failures = Vec::with_capacity(self.decoders.len());
        for (shape, decoder) in &self.decoders {
            match decoder.decode(body) {
                Ok(records) => {
                    let before = records.len();
                    let records: Vec<_> = records
                        .into_iter()
                        .filter(|r| !is_all_null(r))
                        .collect();
                    let dropped_null_rows = before - records.len();

                    debug!(shape = %shape, records = records.len(), dropped_null_rows, "Parsed body");
                    return Ok(ParsedObject {
                        shape: *shape,
                        records,
                        dropped_null_rows,
                    });
                }
                Err(e) => failures.push(format!("{shape}: {e}")),
            }
        }

        Err(Error::malformed(format!(
            "No supported JSON shape matched ({})",
            failures.join("; ")
        )))
    }
}

/// Every field is null (an empty record counts)
pub(crate) fn is_all_null(record: &ParsedRecord) -> bool {
    record.values().all(serde_json::Value::is_null)
}
