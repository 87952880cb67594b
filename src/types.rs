//! Common types used throughout the pipeline
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// One flat record parsed out of a raw object
pub type ParsedRecord = JsonObject;

// ============================================================================
// Raw Objects
// ============================================================================

/// A raw object as reported by a storage listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key, unique within its bucket
    pub key: String,
    /// Modification time reported by the store
    pub last_modified: DateTime<Utc>,
}

impl ObjectInfo {
    /// Create a new object descriptor
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            last_modified,
        }
    }

    /// The watermark string for this object
    pub fn watermark(&self) -> String {
        format_watermark(&self.last_modified)
    }
}

/// Format a timestamp as a watermark.
///
/// Fixed-width UTC with microseconds, so lexicographic order matches time order.
pub fn format_watermark(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ============================================================================
// Watermark Policy
// ============================================================================

/// How a source's watermark advances after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPolicy {
    /// Newest `last_modified` among all listed objects, parsed or not.
    /// A permanently malformed object is skipped forward.
    #[default]
    MaxListed,
    /// Newest `last_modified` among objects that parsed successfully.
    MaxProcessed,
}
