//! Engine types
//!
//! Per-source and per-run reports returned by the pipeline.

use crate::output::OutputArtifact;
use crate::state::Checkpoint;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of processing one logical source in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Source name
    pub name: String,
    /// New objects listed
    pub listed: usize,
    /// Objects parsed successfully
    pub parsed: usize,
    /// Objects skipped as malformed or vanished
    pub skipped: usize,
    /// Records in the written artifact
    pub records_written: usize,
    /// Artifact written this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<OutputArtifact>,
    /// Watermark this run advanced the source to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    /// Failure that stopped this source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    /// Create an empty report
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether the source failed
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Processing time the run was invoked with
    pub run_timestamp: DateTime<Utc>,
    /// Reports in configured source order
    pub sources: Vec<SourceReport>,
    /// Time dimension entries added by this run
    pub time_dim_entries: usize,
    /// Checkpoint after the run
    pub checkpoint: Checkpoint,
}

impl RunSummary {
    /// Report for a source
    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Sources that failed
    pub fn failed_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| s.is_failed())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Artifacts written across all sources
    pub fn artifacts(&self) -> Vec<&OutputArtifact> {
        self.sources.iter().filter_map(|s| s.artifact.as_ref()).collect()
    }

    /// Records written across all sources
    pub fn records_written(&self) -> usize {
        self.sources.iter().map(|s| s.records_written).sum()
    }
}
