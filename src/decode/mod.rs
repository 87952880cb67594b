//! Record parser module
//!
//! Supports: JSON array, newline-delimited JSON, single JSON object
//!
//! # Overview
//!
//! Raw objects arrive in whichever of the three JSON shapes the producer
//! happened to write. The parser tries each shape in a fixed order and
//! normalizes the result into a flat sequence of records, then coerces the
//! calendar fields the time dimension joins on.

mod coerce;
mod decoders;
mod parser;

pub use coerce::{
    coerce_record, derive_time_id, format_datetime, parse_datetime, time_id_from_parts,
    INTEGER_FIELDS,
};
pub use decoders::{JsonArrayDecoder, JsonObjectDecoder, JsonlDecoder, RecordDecoder};
pub use parser::{InputShape, ParsedObject, RecordParser};
