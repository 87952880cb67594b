//! Source listing module
//!
//! Enumerates raw objects under a logical source's prefix and keeps those
//! newer than the source's watermark.
//!
//! An object whose `last_modified` equals the watermark is never listed
//! again: the comparison is strict, so delivery at the boundary timestamp is
//! at-most-once.

use crate::config::LogicalSource;
use crate::error::Result;
use crate::state::Checkpoint;
use crate::storage::Storage;
use crate::types::ObjectInfo;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Lists new raw objects per logical source
#[derive(Debug, Clone)]
pub struct SourceLister {
    storage: Arc<dyn Storage>,
}

impl SourceLister {
    /// Create a lister over the raw bucket
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Objects under the source's prefix newer than its watermark,
    /// ascending by `last_modified` then key.
    ///
    /// Re-listing with the same checkpoint yields the same objects as long
    /// as nothing new has arrived.
    pub async fn list_new(
        &self,
        source: &LogicalSource,
        checkpoint: &Checkpoint,
    ) -> Result<Vec<ObjectInfo>> {
        let include = source.include_regex()?;
        let watermark = checkpoint.get(&source.name);

        let mut listing = self.storage.list(&source.raw_prefix);
        let mut seen = 0usize;
        let mut new_objects = Vec::new();

        while let Some(object) = listing.try_next().await? {
            seen += 1;

            // Directory markers
            if object.key.ends_with('/') {
                continue;
            }
            if let Some(regex) = &include {
                if !regex.is_match(&object.key) {
                    debug!(source = %source.name, key = %object.key, "Key excluded by filter");
                    continue;
                }
            }
            if is_newer(watermark, &object.watermark()) {
                new_objects.push(object);
            }
        }

        new_objects.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        });

        info!(
            source = %source.name,
            prefix = %source.raw_prefix,
            listed = seen,
            new = new_objects.len(),
            "Listed source"
        );
        Ok(new_objects)
    }
}

/// Filter predicate: no watermark yet, or strictly newer than it
pub fn is_newer(watermark: Option<&str>, last_modified: &str) -> bool {
    watermark.map_or(true, |w| last_modified > w)
}
