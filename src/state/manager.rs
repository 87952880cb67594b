//! Checkpoint persistence
//!
//! Stores the checkpoint as a single JSON object at a fixed key in the
//! processed bucket. A missing object is the normal state of a first run.

use super::types::Checkpoint;
use crate::error::{Error, Result};
use crate::storage::Storage;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};

/// Loads and saves the checkpoint object
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// Bucket holding the checkpoint
    storage: Arc<dyn Storage>,
    /// Key of the checkpoint object
    key: String,
}

impl CheckpointStore {
    /// Create a checkpoint store for the given key
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Get the checkpoint key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the checkpoint, or an empty one when none has been saved yet
    pub async fn load(&self) -> Result<Checkpoint> {
        let data = match self.storage.get(&self.key).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                info!(key = %self.key, "No checkpoint found, scanning all objects");
                return Ok(Checkpoint::new());
            }
            Err(e) => return Err(e),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&data).map_err(|e| {
            warn!(key = %self.key, error = %e, "Checkpoint object is not a source-to-watermark map");
            Error::checkpoint(format!("Failed to parse checkpoint '{}': {e}", self.key))
        })?;

        info!(key = %self.key, sources = checkpoint.len(), "Loaded checkpoint");
        Ok(checkpoint)
    }

    /// Persist the checkpoint in a single put
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let contents = serde_json::to_vec(checkpoint)
            .map_err(|e| Error::checkpoint(format!("Failed to serialize checkpoint: {e}")))?;

        self.storage
            .put(&self.key, Bytes::from(contents))
            .await
            .map_err(|e| match e {
                Error::Persistence { .. } => e,
                other => Error::persistence(&self.key, other.to_string()),
            })?;

        info!(key = %self.key, sources = checkpoint.len(), "Saved checkpoint");
        Ok(())
    }

    /// Remove watermarks so the sources are reprocessed from scratch.
    ///
    /// With no source names every watermark is dropped.
    pub async fn reset(&self, sources: &[String]) -> Result<Checkpoint> {
        let checkpoint = if sources.is_empty() {
            Checkpoint::new()
        } else {
            let mut checkpoint = self.load().await?;
            for source in sources {
                if checkpoint.remove(source).is_none() {
                    warn!(source = %source, "Source had no watermark");
                }
            }
            checkpoint
        };

        self.save(&checkpoint).await?;
        Ok(checkpoint)
    }

    /// Drop one source's watermark
    pub async fn clear_source(&self, source: &str) -> Result<Checkpoint> {
        self.reset(&[source.to_string()]).await
    }
}
