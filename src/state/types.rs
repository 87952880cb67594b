//! Checkpoint types
//!
//! Serialized to JSON as a flat object with sorted keys and persisted
//! between runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Watermark per logical source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
    watermarks: BTreeMap<String, String>,
}

impl Checkpoint {
    /// Create a new empty checkpoint
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the watermark for a source
    pub fn get(&self, source: &str) -> Option<&str> {
        self.watermarks.get(source).map(String::as_str)
    }

    /// Whether a source has a watermark
    pub fn contains(&self, source: &str) -> bool {
        self.watermarks.contains_key(source)
    }

    /// Raise a source's watermark.
    ///
    /// Returns whether the stored value changed; a lower or equal value is ignored.
    pub fn advance(&mut self, source: &str, watermark: impl Into<String>) -> bool {
        let watermark = watermark.into();
        match self.watermarks.get(source) {
            Some(current) if current.as_str() >= watermark.as_str() => false,
            _ => {
                self.watermarks.insert(source.to_string(), watermark);
                true
            }
        }
    }

    /// Apply every entry of a per-run delta
    pub fn merge_delta(&mut self, delta: &Checkpoint) {
        for (source, watermark) in &delta.watermarks {
            self.advance(source, watermark.clone());
        }
    }

    /// Drop a source's watermark so it is reprocessed from the beginning
    pub fn remove(&mut self, source: &str) -> Option<String> {
        self.watermarks.remove(source)
    }

    /// Iterate over (source, watermark) in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.watermarks
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of sources with a watermark
    pub fn len(&self) -> usize {
        self.watermarks.len()
    }

    /// Whether no source has a watermark
    pub fn is_empty(&self) -> bool {
        self.watermarks.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Checkpoint {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            watermarks: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
