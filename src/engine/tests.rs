//! Tests for engine module

use super::*;
use crate::config::{LogicalSource, MetricBinding, PipelineConfig};
use crate::metrics::{MetricsSink, Observation};
use crate::storage::MemoryStorage;
use crate::time_dim::{CalendarJob, JobStatus, TimeDimension};
use crate::types::ObjectInfo;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, TimeZone, Utc};
use futures::stream::BoxStream;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::Mutex;

const CHECKPOINT_KEY: &str = "checkpoints/forecast_etl.json";
const TIME_DIM_KEY: &str = "forecast_data/time_dim/time_dim.json";

/// Storage that fails puts, gets or listings under the given prefixes
#[derive(Debug)]
struct FailingStorage {
    inner: MemoryStorage,
    fail_puts: Vec<String>,
    fail_gets: Vec<String>,
    fail_lists: Vec<String>,
}

impl FailingStorage {
    fn new(fail_prefixes: &[&str]) -> Self {
        Self::wrap(MemoryStorage::new("proc")).failing_puts(fail_prefixes)
    }

    fn wrap(inner: MemoryStorage) -> Self {
        Self {
            inner,
            fail_puts: Vec::new(),
            fail_gets: Vec::new(),
            fail_lists: Vec::new(),
        }
    }

    fn failing_puts(mut self, prefixes: &[&str]) -> Self {
        self.fail_puts = prefixes.iter().map(ToString::to_string).collect();
        self
    }

    fn failing_gets(mut self, prefixes: &[&str]) -> Self {
        self.fail_gets = prefixes.iter().map(ToString::to_string).collect();
        self
    }

    fn failing_lists(mut self, prefixes: &[&str]) -> Self {
        self.fail_lists = prefixes.iter().map(ToString::to_string).collect();
        self
    }
}

fn matches_any(prefixes: &[String], key: &str) -> bool {
    prefixes.iter().any(|p| key.starts_with(p.as_str()))
}

#[async_trait]
impl Storage for FailingStorage {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, Result<ObjectInfo>> {
        if matches_any(&self.fail_lists, prefix) {
            let err = Error::storage(format!("simulated listing failure under {prefix}"));
            return Box::pin(futures::stream::once(async move { Err(err) }));
        }
        self.inner.list(prefix)
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        if matches_any(&self.fail_gets, key) {
            return Err(Error::storage(format!("simulated read failure for {key}")));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        if matches_any(&self.fail_puts, key) {
            return Err(Error::persistence(key, "simulated write failure"));
        }
        self.inner.put(key, data).await
    }

    async fn head(&self, key: &str) -> Result<bool> {
        self.inner.head(key).await
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

/// Calendar job that never completes
#[derive(Debug)]
struct StuckJob;

#[async_trait]
impl CalendarJob for StuckJob {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn trigger(&self) -> Result<String> {
        Ok("stuck-1".to_string())
    }

    async fn status(&self, _run_id: &str) -> Result<JobStatus> {
        Ok(JobStatus::Running)
    }
}

/// Sink that keeps what it is given
#[derive(Debug, Default)]
struct RecordingSink {
    seen: Mutex<Vec<Observation>>,
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn publish(&self, observations: &[Observation]) {
        self.seen.lock().await.extend_from_slice(observations);
    }
}

fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, hour, minute, 0).unwrap()
}

fn wm(hour: u32, minute: u32) -> String {
    crate::types::format_watermark(&ts(hour, minute))
}

fn test_config(sources: Vec<LogicalSource>) -> PipelineConfig {
    let mut config = PipelineConfig::new("memory://raw", "memory://proc").with_sources(sources);
    config.time_dimension.start = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
    config.time_dimension.end = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
    config.time_dimension.poll_interval_ms = 5;
    config
}

fn three_sources() -> Vec<LogicalSource> {
    vec![
        LogicalSource::new("a", "raw/a/"),
        LogicalSource::new("b", "raw/b/"),
        LogicalSource::new("c", "raw/c/"),
    ]
}

struct Harness {
    raw: Arc<MemoryStorage>,
    processed: Arc<MemoryStorage>,
    pipeline: EtlPipeline,
}

fn harness(config: PipelineConfig) -> Harness {
    let raw = Arc::new(MemoryStorage::new("raw"));
    let processed = Arc::new(MemoryStorage::new("proc"));
    let pipeline = EtlPipeline::new(config, raw.clone(), processed.clone());
    Harness {
        raw,
        processed,
        pipeline,
    }
}

// ============================================================================
// Incremental Processing Tests
// ============================================================================

#[tokio::test]
async fn test_first_run_processes_everything() {
    let h = harness(test_config(three_sources()));
    h.raw.put_at("raw/a/1.json", r#"[{"v": 1}, {"v": 2}]"#, ts(1, 0)).await;
    h.raw.put_at("raw/a/2.json", "{\"v\": 3}\n{\"v\": 4}\n", ts(2, 0)).await;
    h.raw.put_at("raw/b/1.json", r#"{"v": 5}"#, ts(1, 30)).await;

    let summary = h.pipeline.run(ts(6, 0)).await.unwrap();

    let a = summary.source("a").unwrap();
    assert_eq!((a.listed, a.parsed, a.skipped, a.records_written), (2, 2, 0, 4));
    assert_eq!(
        a.artifact.as_ref().map(|x| x.key.as_str()),
        Some("raw/a/202511030600.json")
    );
    assert_eq!(summary.source("b").unwrap().records_written, 1);
    assert_eq!(summary.source("c").unwrap().artifact, None);

    let expected: Checkpoint = [("a", wm(2, 0)), ("b", wm(1, 30))].into_iter().collect();
    assert_eq!(summary.checkpoint, expected);
    assert_eq!(h.pipeline.checkpoints().load().await.unwrap(), expected);
}

#[tokio::test]
async fn test_rerun_without_new_objects_is_idempotent() {
    let h = harness(test_config(three_sources()));
    h.raw.put_at("raw/a/1.json", r#"{"v": 1}"#, ts(1, 0)).await;

    let first = h.pipeline.run(ts(6, 0)).await.unwrap();
    let keys_after_first = h.processed.keys("").await;

    let second = h.pipeline.run(ts(7, 0)).await.unwrap();

    assert!(second.artifacts().is_empty());
    assert_eq!(second.checkpoint, first.checkpoint);
    assert_eq!(h.processed.keys("").await, keys_after_first);
}

#[tokio::test]
async fn test_watermark_is_monotonic_across_runs() {
    let h = harness(test_config(three_sources()));
    h.raw.put_at("raw/a/1.json", r#"{"v": 1}"#, ts(1, 0)).await;
    let first = h.pipeline.run(ts(6, 0)).await.unwrap();

    h.raw.put_at("raw/a/2.json", r#"{"v": 2}"#, ts(3, 0)).await;
    let second = h.pipeline.run(ts(7, 0)).await.unwrap();

    let a = second.source("a").unwrap();
    assert_eq!(a.listed, 1);
    assert_eq!(a.records_written, 1);
    assert!(second.checkpoint.get("a") >= first.checkpoint.get("a"));
    assert_eq!(second.checkpoint.get("a"), Some(wm(3, 0).as_str()));
}

#[tokio::test]
async fn test_object_at_watermark_boundary_is_excluded() {
    let h = harness(test_config(three_sources()));
    h.raw.put_at("raw/a/1.json", r#"{"v": 1}"#, ts(1, 0)).await;
    h.pipeline.run(ts(6, 0)).await.unwrap();

    // Arrives late with the same modification time as the watermark
    h.raw.put_at("raw/a/late.json", r#"{"v": 2}"#, ts(1, 0)).await;
    let summary = h.pipeline.run(ts(7, 0)).await.unwrap();

    let a = summary.source("a").unwrap();
    assert_eq!(a.listed, 0);
    assert_eq!(a.artifact, None);
}

// ============================================================================
// Failure Isolation Tests
// ============================================================================

#[tokio::test]
async fn test_write_failure_isolated_to_one_source() {
    let raw = Arc::new(MemoryStorage::new("raw"));
    let processed = Arc::new(FailingStorage::new(&["raw/b/"]));
    let pipeline = EtlPipeline::new(test_config(three_sources()), raw.clone(), processed.clone());

    for name in ["a", "b", "c"] {
        raw.put_at(&format!("raw/{name}/1.json"), r#"{"v": 1}"#, ts(1, 0)).await;
    }

    let summary = pipeline.run(ts(6, 0)).await.unwrap();

    assert_eq!(summary.failed_sources(), vec!["b"]);
    assert!(summary.source("b").unwrap().error.as_deref().unwrap().contains("raw/b/"));
    assert_eq!(summary.checkpoint.get("a"), Some(wm(1, 0).as_str()));
    assert_eq!(summary.checkpoint.get("b"), None);
    assert_eq!(summary.checkpoint.get("c"), Some(wm(1, 0).as_str()));

    let persisted = pipeline.checkpoints().load().await.unwrap();
    assert_eq!(persisted, summary.checkpoint);
}

/// Seeds `raw/{a,b,c}/1.json`, commits a first run, then adds a newer
/// object per source
async fn seeded_raw() -> (MemoryStorage, Checkpoint) {
    let raw = MemoryStorage::new("raw");
    for name in ["a", "b", "c"] {
        raw.put_at(&format!("raw/{name}/1.json"), r#"{"v": 1}"#, ts(1, 0)).await;
    }
    let first: Checkpoint = ["a", "b", "c"].into_iter().map(|n| (n, wm(1, 0))).collect();
    for name in ["a", "b", "c"] {
        raw.put_at(&format!("raw/{name}/2.json"), r#"{"v": 2}"#, ts(2, 0)).await;
    }
    (raw, first)
}

async fn run_with_failing_raw(raw: FailingStorage, previous: &Checkpoint) -> RunSummary {
    let processed = Arc::new(MemoryStorage::new("proc"));
    let pipeline = EtlPipeline::new(test_config(three_sources()), Arc::new(raw), processed);
    pipeline.checkpoints().save(previous).await.unwrap();
    pipeline.run(ts(6, 0)).await.unwrap()
}

#[tokio::test]
async fn test_listing_failure_isolated_to_one_source() {
    let (raw, previous) = seeded_raw().await;
    let raw = FailingStorage::wrap(raw).failing_lists(&["raw/b/"]);

    let summary = run_with_failing_raw(raw, &previous).await;

    assert_eq!(summary.failed_sources(), vec!["b"]);
    assert!(summary.source("b").unwrap().error.as_deref().unwrap().contains("listing"));
    assert_eq!(summary.checkpoint.get("a"), Some(wm(2, 0).as_str()));
    assert_eq!(summary.checkpoint.get("b"), Some(wm(1, 0).as_str()));
    assert_eq!(summary.checkpoint.get("c"), Some(wm(2, 0).as_str()));
}

#[tokio::test]
async fn test_read_failure_isolated_to_one_source() {
    let (raw, previous) = seeded_raw().await;
    let raw = FailingStorage::wrap(raw).failing_gets(&["raw/b/2.json"]);

    let summary = run_with_failing_raw(raw, &previous).await;

    assert_eq!(summary.failed_sources(), vec!["b"]);
    let b = summary.source("b").unwrap();
    assert!(b.error.as_deref().unwrap().contains("raw/b/2.json"));
    assert_eq!(b.artifact, None);
    assert_eq!(summary.checkpoint.get("a"), Some(wm(2, 0).as_str()));
    assert_eq!(summary.checkpoint.get("b"), Some(wm(1, 0).as_str()));
    assert_eq!(summary.checkpoint.get("c"), Some(wm(2, 0).as_str()));
}

#[tokio::test]
async fn test_runs_within_one_minute_do_not_lose_records() {
    let h = harness(test_config(vec![LogicalSource::new("r", "r/")]));
    let at = |second| Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, second).unwrap();

    h.raw.put_at("r/a.json", r#"{"v": "A"}"#, ts(1, 0)).await;
    let first = h.pipeline.run(at(5)).await.unwrap();
    assert_eq!(first.checkpoint.get("r"), Some(wm(1, 0).as_str()));

    h.raw.put_at("r/b.json", r#"{"v": "B"}"#, ts(2, 0)).await;
    let second = h.pipeline.run(at(40)).await.unwrap();

    // The existing artifact is kept and B stays pending
    assert_eq!(second.failed_sources(), vec!["r"]);
    assert_eq!(second.checkpoint.get("r"), Some(wm(1, 0).as_str()));
    let body = h.processed.get("r/202511030900.json").await.unwrap();
    assert_eq!(&body[..], b"{\"v\":\"A\"}\n");

    let third = h.pipeline.run(ts(9, 1)).await.unwrap();
    assert_eq!(third.source("r").unwrap().records_written, 1);
    assert_eq!(third.checkpoint.get("r"), Some(wm(2, 0).as_str()));
    let body = h.processed.get("r/202511030901.json").await.unwrap();
    assert_eq!(&body[..], b"{\"v\":\"B\"}\n");
}

#[tokio::test]
async fn test_checkpoint_commit_failure_fails_run() {
    let raw = Arc::new(MemoryStorage::new("raw"));
    let processed = Arc::new(FailingStorage::new(&[CHECKPOINT_KEY]));
    let pipeline = EtlPipeline::new(test_config(three_sources()), raw.clone(), processed.clone());
    raw.put_at("raw/a/1.json", r#"{"v": 1}"#, ts(1, 0)).await;

    let err = pipeline.run(ts(6, 0)).await.unwrap_err();
    assert!(matches!(err, Error::Persistence { ref key, .. } if key == CHECKPOINT_KEY));

    // The artifact stays; the next run reprocesses into a new one
    assert!(processed.head("raw/a/202511030600.json").await.unwrap());
}

#[tokio::test]
async fn test_time_dim_timeout_aborts_before_any_commit() {
    let mut config = test_config(three_sources());
    config.time_dimension.job_timeout_secs = 1;
    let h = harness(config);
    let pipeline = h.pipeline.with_calendar_job(Arc::new(StuckJob));
    h.raw.put_at("raw/a/1.json", r#"{"v": 1}"#, ts(1, 0)).await;

    let err = pipeline.run(ts(6, 0)).await.unwrap_err();

    assert!(matches!(err, Error::UpstreamTimeout { .. }), "got {err}");
    assert!(!h.processed.head(CHECKPOINT_KEY).await.unwrap());
    assert!(h.processed.keys("raw/").await.is_empty());
}

// ============================================================================
// Watermark Policy Tests
// ============================================================================

async fn run_with_malformed_newest(policy: WatermarkPolicy) -> (RunSummary, RunSummary) {
    let h = harness(test_config(three_sources()).with_watermark_policy(policy));
    h.raw.put_at("raw/a/1.json", r#"{"v": 1}"#, ts(1, 0)).await;
    h.raw.put_at("raw/a/2.json", "not json at all", ts(2, 0)).await;

    let first = h.pipeline.run(ts(6, 0)).await.unwrap();
    let second = h.pipeline.run(ts(7, 0)).await.unwrap();
    (first, second)
}

#[tokio::test]
async fn test_max_listed_skips_past_malformed_object() {
    let (first, second) = run_with_malformed_newest(WatermarkPolicy::MaxListed).await;

    let a = first.source("a").unwrap();
    assert_eq!((a.listed, a.parsed, a.skipped), (2, 1, 1));
    assert_eq!(first.checkpoint.get("a"), Some(wm(2, 0).as_str()));

    // Never listed again
    assert_eq!(second.source("a").unwrap().listed, 0);
}

#[tokio::test]
async fn test_max_processed_stops_at_last_parsed_object() {
    let (first, second) = run_with_malformed_newest(WatermarkPolicy::MaxProcessed).await;

    assert_eq!(first.checkpoint.get("a"), Some(wm(1, 0).as_str()));

    // The malformed object is retried, still skipped, and writes nothing
    let a = second.source("a").unwrap();
    assert_eq!((a.listed, a.skipped), (1, 1));
    assert_eq!(a.artifact, None);
    assert_eq!(second.checkpoint.get("a"), Some(wm(1, 0).as_str()));
}

#[tokio::test]
async fn test_no_records_no_advance() {
    let h = harness(test_config(three_sources()));
    h.raw.put_at("raw/a/1.json", "[]", ts(1, 0)).await;
    h.raw.put_at("raw/a/2.json", r#"[{"v": null}]"#, ts(2, 0)).await;

    let summary = h.pipeline.run(ts(6, 0)).await.unwrap();

    let a = summary.source("a").unwrap();
    assert_eq!((a.listed, a.parsed), (2, 2));
    assert_eq!(a.artifact, None);
    assert_eq!(summary.checkpoint.get("a"), None);
}

// ============================================================================
// Transform and Time Dimension Tests
// ============================================================================

#[tokio::test]
async fn test_records_deduplicated_across_objects() {
    let h = harness(test_config(three_sources()));
    h.raw.put_at("raw/a/1.json", r#"{"v": 1, "hour": "7"}"#, ts(1, 0)).await;
    h.raw.put_at("raw/a/2.json", r#"{"v": 1, "hour": 7}"#, ts(2, 0)).await;

    let summary = h.pipeline.run(ts(6, 0)).await.unwrap();
    assert_eq!(summary.source("a").unwrap().records_written, 1);
}

#[tokio::test]
async fn test_time_dim_generated_then_merged() {
    let sources = vec![
        LogicalSource::new("forecast_time_dim", "forecast_data/forecast_time_dim/"),
        LogicalSource::new("forecast_fact", "forecast_data/forecast_fact/"),
    ];
    let h = harness(test_config(sources));
    h.raw
        .put_at(
            "forecast_data/forecast_time_dim/1.json",
            r#"[{"year": 2025, "month": 11, "day": 4, "hour": 1}, {"year": 2025, "month": 11, "day": 3, "hour": 5}]"#,
            ts(1, 0),
        )
        .await;
    h.raw
        .put_at(
            "forecast_data/forecast_fact/1.json",
            r#"{"year": 2030, "month": 1, "day": 1, "hour": 0, "temperature_c": 1}"#,
            ts(1, 0),
        )
        .await;

    let summary = h.pipeline.run(ts(6, 0)).await.unwrap();

    // 24 generated hours plus one new hour from the time-dim source
    assert_eq!(summary.time_dim_entries, 1);
    let dim = h.pipeline.time_dimension().load().await.unwrap();
    assert_eq!(dim.len(), 25);
    assert!(dim.contains(2025110401));
    assert!(!dim.contains(2030010100));

    // Replaying the same entry adds nothing
    h.raw
        .put_at(
            "forecast_data/forecast_time_dim/2.json",
            r#"{"time_id": 2025110401}"#,
            ts(2, 0),
        )
        .await;
    let summary = h.pipeline.run(ts(7, 0)).await.unwrap();
    assert_eq!(summary.time_dim_entries, 0);
    assert_eq!(h.pipeline.time_dimension().load().await.unwrap().len(), 25);
}

#[tokio::test]
async fn test_existing_time_dim_is_not_regenerated() {
    let h = harness(test_config(three_sources()));
    let existing = TimeDimension::from_entries(crate::time_dim::TimeDimensionEntry::from_time_id(2024010100));
    h.processed
        .put(TIME_DIM_KEY, Bytes::from(existing.to_ndjson().unwrap()))
        .await
        .unwrap();
    let pipeline = h.pipeline.with_calendar_job(Arc::new(StuckJob));

    pipeline.run(ts(6, 0)).await.unwrap();
    assert_eq!(pipeline.time_dimension().load().await.unwrap(), existing);
}

// ============================================================================
// Metrics Tests
// ============================================================================

#[tokio::test]
async fn test_metrics_published_for_bound_sources() {
    let source = LogicalSource::new("forecast_fact", "forecast_data/forecast_fact/").with_metrics(vec![
        MetricBinding::new("temperature_c", "TemperatureC", "None"),
    ]);
    let h = harness(test_config(vec![source]));
    let sink = Arc::new(RecordingSink::default());
    let pipeline = h.pipeline.with_metrics(sink.clone());
    h.raw
        .put_at(
            "forecast_data/forecast_fact/1.json",
            r#"[{"temperature_c": 21.5}, {"temperature_c": null}]"#,
            ts(1, 0),
        )
        .await;

    pipeline.run(ts(6, 0)).await.unwrap();

    let seen = sink.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "TemperatureC");
    assert_eq!(seen[0].value, 21.5);
    assert_eq!(seen[0].namespace, "EcoFarm/Forecast");
}

#[tokio::test]
async fn test_unreachable_metrics_endpoint_does_not_fail_run() {
    let source = LogicalSource::new("forecast_fact", "forecast_data/forecast_fact/").with_metrics(vec![
        MetricBinding::new("rain_mm", "RainfallMM", "Millimeters"),
    ]);
    let h = harness(test_config(vec![source]));
    let sink = crate::metrics::HttpMetricsSink::new("http://127.0.0.1:9/metrics").unwrap();
    let pipeline = h.pipeline.with_metrics(Arc::new(sink));
    h.raw
        .put_at("forecast_data/forecast_fact/1.json", r#"{"rain_mm": 0.2}"#, ts(1, 0))
        .await;

    let summary = pipeline.run(ts(6, 0)).await.unwrap();
    assert!(summary.checkpoint.contains("forecast_fact"));
}
