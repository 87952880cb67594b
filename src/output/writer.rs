//! Partitioned artifact writer

use super::partition::{build_output_key, partition_date};
use crate::config::LogicalSource;
use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::types::ParsedRecord;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// One artifact written for a source in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    /// Key in the processed bucket
    pub key: String,
    /// Partition date, `YYYY-MM-DD`
    pub partition: String,
    /// Number of records written
    pub records: usize,
}

/// Writes transformed records to the processed bucket
#[derive(Debug, Clone)]
pub struct PartitionWriter {
    storage: Arc<dyn Storage>,
    hive_partitioning: bool,
}

impl PartitionWriter {
    /// Create a writer over the processed bucket
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            hive_partitioning: false,
        }
    }

    /// Write under `dt=YYYY-MM-DD/` directories
    #[must_use]
    pub fn with_hive_partitioning(mut self, enabled: bool) -> Self {
        self.hive_partitioning = enabled;
        self
    }

    /// Write one NDJSON artifact in a single put.
    ///
    /// Returns `None` without touching storage when there are no records.
    /// Refuses to replace an artifact already stored under the same key, so
    /// two runs within one minute never clobber each other.
    pub async fn write(
        &self,
        source: &LogicalSource,
        records: &[ParsedRecord],
        run_ts: DateTime<Utc>,
    ) -> Result<Option<OutputArtifact>> {
        if records.is_empty() {
            return Ok(None);
        }

        let key = build_output_key(&source.output_prefix(), &run_ts, self.hive_partitioning);
        let body = to_ndjson(records)?;
        let size = body.len();

        // Artifacts of earlier runs may already be covered by a committed watermark
        let exists = self.storage.head(&key).await.map_err(|e| as_persistence(&key, e))?;
        if exists {
            return Err(Error::persistence(&key, "artifact already exists"));
        }

        self.storage
            .put(&key, Bytes::from(body))
            .await
            .map_err(|e| as_persistence(&key, e))?;

        info!(
            source = %source.name,
            key = %key,
            records = records.len(),
            bytes = size,
            "Wrote artifact"
        );

        Ok(Some(OutputArtifact {
            key,
            partition: partition_date(&run_ts),
            records: records.len(),
        }))
    }
}

fn as_persistence(key: &str, err: Error) -> Error {
    match err {
        Error::Persistence { .. } => err,
        other => Error::persistence(key, other.to_string()),
    }
}

/// One JSON object per line, newline-terminated
pub fn to_ndjson(records: &[ParsedRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}
