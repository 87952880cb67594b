//! Execution engine module
//!
//! Sequences listing, parsing, transformation and writing across every
//! configured source for one invocation.
//!
//! # Overview
//!
//! The engine module provides:
//! - `EtlPipeline` - runs the pipeline once and commits progress at the end
//! - `RunSummary` / `SourceReport` - what a run did, per source
//!
//! # Commit ordering
//!
//! Watermarks advanced during a run go into a delta that only reaches storage
//! after every source has been processed and the time dimension has been
//! committed. A run aborted before that leaves artifacts behind but no
//! checkpoint progress, so the next run reprocesses the same objects into a
//! new artifact.
//!
//! Runs assume a single writer per checkpoint key. Concurrent runs against
//! the same deployment can lose watermark progress.

mod types;

pub use types::{RunSummary, SourceReport};

use crate::config::{LogicalSource, MetricsConfig, PipelineConfig};
use crate::decode::RecordParser;
use crate::error::{Error, Result};
use crate::listing::SourceLister;
use crate::metrics::{observations_for, sink_from_config, MetricsSink, TracingMetricsSink};
use crate::output::{transform_records, PartitionWriter};
use crate::state::{Checkpoint, CheckpointStore};
use crate::storage::{open_storage, Storage};
use crate::time_dim::{
    entries_from_records, CalendarJob, LocalCalendarJob, TimeDimensionEntry, TimeDimensionResolver,
};
use crate::types::{ObjectInfo, ParsedRecord, WatermarkPolicy};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// What one source contributes to the end-of-run commit
struct SourceOutcome {
    report: SourceReport,
    watermark: Option<String>,
    time_entries: Vec<TimeDimensionEntry>,
}

/// Incremental ETL over the configured logical sources
#[derive(Debug)]
pub struct EtlPipeline {
    config: PipelineConfig,
    raw: Arc<dyn Storage>,
    processed: Arc<dyn Storage>,
    checkpoints: CheckpointStore,
    lister: SourceLister,
    parser: RecordParser,
    writer: PartitionWriter,
    time_dim: TimeDimensionResolver,
    metrics: Arc<dyn MetricsSink>,
}

impl EtlPipeline {
    /// Create a pipeline over the given buckets.
    ///
    /// The time dimension is generated in-process when missing and metrics
    /// go to the log.
    pub fn new(config: PipelineConfig, raw: Arc<dyn Storage>, processed: Arc<dyn Storage>) -> Self {
        let td = &config.time_dimension;
        let job: Arc<dyn CalendarJob> = Arc::new(LocalCalendarJob::new(
            td.job_name.clone(),
            Arc::clone(&processed),
            config.time_dim_key.clone(),
            td.start,
            td.end,
        ));

        Self {
            checkpoints: CheckpointStore::new(Arc::clone(&processed), config.checkpoint_key.clone()),
            lister: SourceLister::new(Arc::clone(&raw)),
            parser: RecordParser::new(),
            writer: PartitionWriter::new(Arc::clone(&processed))
                .with_hive_partitioning(config.hive_partitioning),
            time_dim: Self::resolver(&config, Arc::clone(&processed), job),
            metrics: Arc::new(TracingMetricsSink),
            raw,
            processed,
            config,
        }
    }

    fn resolver(
        config: &PipelineConfig,
        processed: Arc<dyn Storage>,
        job: Arc<dyn CalendarJob>,
    ) -> TimeDimensionResolver {
        TimeDimensionResolver::new(processed, config.time_dim_key.clone(), job)
            .with_timeout(config.time_dimension.job_timeout())
            .with_poll_interval(config.time_dimension.poll_interval())
    }

    /// Open the configured buckets and metrics sink
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let raw = open_storage(&config.raw_bucket)?;
        let processed = open_storage(&config.processed_bucket)?;
        let metrics = sink_from_config(config.metrics.as_ref())?;
        Ok(Self::new(config, raw, processed).with_metrics(metrics))
    }

    /// Replace the metrics sink
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the calendar generation job
    #[must_use]
    pub fn with_calendar_job(mut self, job: Arc<dyn CalendarJob>) -> Self {
        self.time_dim = Self::resolver(&self.config, Arc::clone(&self.processed), job);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the checkpoint store
    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Get the time dimension resolver
    pub fn time_dimension(&self) -> &TimeDimensionResolver {
        &self.time_dim
    }

    /// Run once for every configured source.
    ///
    /// Sources fail independently; a failed source keeps its old watermark.
    /// Errors loading state, resolving the time dimension or committing
    /// fail the whole run.
    pub async fn run(&self, run_ts: DateTime<Utc>) -> Result<RunSummary> {
        let start = Instant::now();
        info!(run_timestamp = %run_ts, sources = self.config.sources.len(), "Starting run");

        let checkpoint = self.checkpoints.load().await?;
        let mut dim = self.time_dim.load_or_generate().await?;

        let mut delta = Checkpoint::new();
        let mut reports = Vec::with_capacity(self.config.sources.len());
        let mut new_entries = Vec::new();

        for source in &self.config.sources {
            match self.process_source(source, &checkpoint, run_ts).await {
                Ok(outcome) => {
                    if let Some(watermark) = outcome.watermark {
                        delta.advance(&source.name, watermark);
                    }
                    new_entries.extend(outcome.time_entries);
                    reports.push(outcome.report);
                }
                Err(e) if e.is_source_local() => {
                    error!(source = %source.name, error = %e, "Source failed, watermark not advanced");
                    let mut report = SourceReport::new(&source.name);
                    report.error = Some(e.to_string());
                    reports.push(report);
                }
                Err(e) => return Err(e),
            }
        }

        let added = dim.extend(new_entries);
        if added > 0 {
            self.time_dim.commit(&dim).await?;
        }

        let mut committed = checkpoint.clone();
        committed.merge_delta(&delta);
        if committed != checkpoint {
            self.checkpoints.save(&committed).await?;
        }

        let summary = RunSummary {
            run_timestamp: run_ts,
            sources: reports,
            time_dim_entries: added,
            checkpoint: committed,
        };

        info!(
            artifacts = summary.artifacts().len(),
            records = summary.records_written(),
            time_dim_entries = added,
            failed = summary.failed_sources().len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Run complete"
        );
        Ok(summary)
    }

    async fn process_source(
        &self,
        source: &LogicalSource,
        checkpoint: &Checkpoint,
        run_ts: DateTime<Utc>,
    ) -> Result<SourceOutcome> {
        let mut report = SourceReport::new(&source.name);
        let objects = self.lister.list_new(source, checkpoint).await?;
        report.listed = objects.len();

        let mut records = Vec::new();
        let mut max_processed = None;

        for object in &objects {
            let data = match self.raw.get(&object.key).await {
                Ok(data) => data,
                Err(e) if e.is_not_found() => {
                    warn!(source = %source.name, key = %object.key, "Object vanished after listing");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.parser.parse(&data) {
                Ok(parsed) => {
                    report.parsed += 1;
                    records.extend(parsed);
                    max_processed = Some(object.watermark());
                }
                Err(Error::MalformedInput { message }) => {
                    warn!(
                        source = %source.name,
                        key = %object.key,
                        error = %message,
                        "Skipping malformed object"
                    );
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let records = transform_records(source, records);
        let Some(artifact) = self.writer.write(source, &records, run_ts).await? else {
            if report.listed > 0 {
                info!(source = %source.name, listed = report.listed, "No records, watermark unchanged");
            }
            return Ok(SourceOutcome {
                report,
                watermark: None,
                time_entries: Vec::new(),
            });
        };

        let watermark = match self.config.watermark_policy {
            WatermarkPolicy::MaxListed => objects.last().map(ObjectInfo::watermark),
            WatermarkPolicy::MaxProcessed => max_processed,
        };

        let time_entries = if source.contributes_time_dim() {
            entries_from_records(&records)
        } else {
            Vec::new()
        };

        self.publish_metrics(source, &records, run_ts).await;

        report.records_written = artifact.records;
        report.artifact = Some(artifact);
        report.watermark.clone_from(&watermark);

        Ok(SourceOutcome {
            report,
            watermark,
            time_entries,
        })
    }

    /// Fire-and-forget; sinks swallow their own failures
    async fn publish_metrics(
        &self,
        source: &LogicalSource,
        records: &[ParsedRecord],
        run_ts: DateTime<Utc>,
    ) {
        if source.metrics.is_empty() {
            return;
        }
        let defaults = MetricsConfig::default();
        let metrics = self.config.metrics.as_ref().unwrap_or(&defaults);
        let observations = observations_for(
            records,
            &source.metrics,
            &metrics.namespace,
            &metrics.location,
            run_ts,
        );
        self.metrics.publish(&observations).await;
    }
}

#[cfg(test)]
mod tests;
