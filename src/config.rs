//! Pipeline configuration
//!
//! This module contains the configuration structures for one deployment,
//! loaded from YAML and validated before any component is constructed.

use crate::error::{Error, Result};
use crate::types::WatermarkPolicy;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Pipeline Config
// ============================================================================

/// Complete pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bucket URL holding raw objects (`s3://`, `gs://`, `file://`, `memory://`, ...)
    pub raw_bucket: String,

    /// Bucket URL receiving output artifacts, the checkpoint and the time dimension
    pub processed_bucket: String,

    /// Key of the checkpoint object in the processed bucket
    #[serde(default = "default_checkpoint_key")]
    pub checkpoint_key: String,

    /// Key of the time dimension object in the processed bucket
    #[serde(default = "default_time_dim_key")]
    pub time_dim_key: String,

    /// Logical sources, processed in order
    #[serde(default = "default_sources")]
    pub sources: Vec<LogicalSource>,

    /// Time dimension generation settings
    #[serde(default)]
    pub time_dimension: TimeDimensionConfig,

    /// How watermarks advance past unparseable objects
    #[serde(default)]
    pub watermark_policy: WatermarkPolicy,

    /// Write artifacts under `dt=YYYY-MM-DD/` directories
    #[serde(default)]
    pub hive_partitioning: bool,

    /// Metrics publishing (absent = log only)
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

fn default_checkpoint_key() -> String {
    "checkpoints/forecast_etl.json".to_string()
}

fn default_time_dim_key() -> String {
    "forecast_data/time_dim/time_dim.json".to_string()
}

fn default_sources() -> Vec<LogicalSource> {
    PipelineConfig::default_sources()
}

impl PipelineConfig {
    /// Create a config for the given buckets with the default source list
    pub fn new(raw_bucket: impl Into<String>, processed_bucket: impl Into<String>) -> Self {
        Self {
            raw_bucket: raw_bucket.into(),
            processed_bucket: processed_bucket.into(),
            checkpoint_key: default_checkpoint_key(),
            time_dim_key: default_time_dim_key(),
            sources: Self::default_sources(),
            time_dimension: TimeDimensionConfig::default(),
            watermark_policy: WatermarkPolicy::default(),
            hive_partitioning: false,
            metrics: None,
        }
    }

    /// Replace the source list
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<LogicalSource>) -> Self {
        self.sources = sources;
        self
    }

    /// Set the watermark policy
    #[must_use]
    pub fn with_watermark_policy(mut self, policy: WatermarkPolicy) -> Self {
        self.watermark_policy = policy;
        self
    }

    /// The farm deployment's known raw prefixes
    pub fn default_sources() -> Vec<LogicalSource> {
        let forecast_metrics = vec![
            MetricBinding::new("temperature_c", "TemperatureC", "None"),
            MetricBinding::new("rain_mm", "RainfallMM", "Millimeters"),
            MetricBinding::new("solarradiation_w", "SolarRadiationW", "Watts"),
            MetricBinding::new("wind_speed_kmh", "WindSpeedKMH", "Kilometers/Hour"),
            MetricBinding::new("humidity", "Humidity", "Percent"),
            MetricBinding::new("cloudcover", "CloudCover", "Percent"),
        ];

        vec![
            LogicalSource::new("download_time_dim", "forecast_data/download_time_dim/"),
            LogicalSource::new("forecast_fact", "forecast_data/forecast_fact/")
                .with_metrics(forecast_metrics),
            LogicalSource::new("forecast_time_dim", "forecast_data/forecast_time_dim/"),
            LogicalSource::new("location_dim", "forecast_data/location_dim/")
                .with_dedup_keys(vec!["location_id".to_string()])
                .with_surrogate_key(SurrogateKeyConfig::new(
                    "location_id",
                    vec!["latitude".to_string(), "longitude".to_string()],
                )),
            LogicalSource::new("solar_fact", "measured_data/solar_fact/"),
            LogicalSource::new("solar_time_dim", "measured_data/solar_time_dim/"),
            LogicalSource::new("water_level_fact", "measured_data/water_level_fact/"),
            LogicalSource::new("water_level_time_dim", "measured_data/water_level_time_dim/"),
        ]
    }

    /// Look up a source by name
    pub fn source(&self, name: &str) -> Option<&LogicalSource> {
        self.sources.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Logical Sources
// ============================================================================

/// A named category of raw data mapped to one storage prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalSource {
    /// Unique source name (checkpoint key)
    pub name: String,

    /// Prefix in the raw bucket
    pub raw_prefix: String,

    /// Prefix in the processed bucket (defaults to the raw prefix)
    #[serde(default)]
    pub output_prefix: Option<String>,

    /// Whether records feed the shared time dimension
    /// (defaults to true when the prefix names a time dimension)
    #[serde(default)]
    pub contributes_time_dim: Option<bool>,

    /// Regex that object keys must match
    #[serde(default)]
    pub include: Option<String>,

    /// Fields identifying a duplicate record (empty = whole record)
    #[serde(default)]
    pub dedup_keys: Vec<String>,

    /// Derived surrogate key columns
    #[serde(default)]
    pub surrogate_keys: Vec<SurrogateKeyConfig>,

    /// Numeric fields published as metrics
    #[serde(default)]
    pub metrics: Vec<MetricBinding>,
}

impl LogicalSource {
    /// Create a source with defaults for everything but name and prefix
    pub fn new(name: impl Into<String>, raw_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_prefix: raw_prefix.into(),
            output_prefix: None,
            contributes_time_dim: None,
            include: None,
            dedup_keys: Vec::new(),
            surrogate_keys: Vec::new(),
            metrics: Vec::new(),
        }
    }

    /// Set the output prefix
    #[must_use]
    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = Some(prefix.into());
        self
    }

    /// Set whether records feed the time dimension
    #[must_use]
    pub fn with_time_dim(mut self, contributes: bool) -> Self {
        self.contributes_time_dim = Some(contributes);
        self
    }

    /// Set the key filter
    #[must_use]
    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include = Some(pattern.into());
        self
    }

    /// Set dedup fields
    #[must_use]
    pub fn with_dedup_keys(mut self, keys: Vec<String>) -> Self {
        self.dedup_keys = keys;
        self
    }

    /// Add a surrogate key column
    #[must_use]
    pub fn with_surrogate_key(mut self, key: SurrogateKeyConfig) -> Self {
        self.surrogate_keys.push(key);
        self
    }

    /// Set metric bindings
    #[must_use]
    pub fn with_metrics(mut self, metrics: Vec<MetricBinding>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Effective output prefix, without a trailing slash
    pub fn output_prefix(&self) -> String {
        self.output_prefix
            .as_deref()
            .unwrap_or(&self.raw_prefix)
            .trim_end_matches('/')
            .to_string()
    }

    /// Effective time dimension flag
    pub fn contributes_time_dim(&self) -> bool {
        self.contributes_time_dim
            .unwrap_or_else(|| self.raw_prefix.contains("time_dim"))
    }

    /// Compile the key filter
    pub fn include_regex(&self) -> Result<Option<Regex>> {
        self.include
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    Error::invalid_value(format!("sources.{}.include", self.name), e.to_string())
                })
            })
            .transpose()
    }
}

/// A surrogate key derived from natural-key fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateKeyConfig {
    /// Field to fill in when absent
    pub field: String,
    /// Natural key fields, in order
    pub from: Vec<String>,
    /// Key range
    #[serde(default = "default_modulus")]
    pub modulus: u64,
}

fn default_modulus() -> u64 {
    1_000_000
}

impl SurrogateKeyConfig {
    /// Create a surrogate key config with the default modulus
    pub fn new(field: impl Into<String>, from: Vec<String>) -> Self {
        Self {
            field: field.into(),
            from,
            modulus: default_modulus(),
        }
    }
}

/// Binds a record field to a published metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricBinding {
    /// Record field holding the value
    pub field: String,
    /// Metric name
    pub name: String,
    /// Unit label
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "None".to_string()
}

impl MetricBinding {
    /// Create a binding
    pub fn new(field: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            name: name.into(),
            unit: unit.into(),
        }
    }
}

// ============================================================================
// Time Dimension Config
// ============================================================================

/// Calendar generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeDimensionConfig {
    /// First day of the generated calendar
    #[serde(default = "default_start")]
    pub start: NaiveDate,

    /// Last day of the generated calendar (inclusive, through 23:00)
    #[serde(default = "default_end")]
    pub end: NaiveDate,

    /// Name reported for the generation job
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// Upper bound on waiting for the generation job
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// Interval between job status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for TimeDimensionConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            job_name: default_job_name(),
            job_timeout_secs: default_job_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl TimeDimensionConfig {
    /// Job wait bound
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 12, 31).unwrap_or_default()
}

fn default_job_name() -> String {
    "generate-time-dim".to_string()
}

fn default_job_timeout() -> u64 {
    900
}

fn default_poll_interval() -> u64 {
    2000
}

// ============================================================================
// Metrics Config
// ============================================================================

/// Metrics publishing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Emit observations at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP endpoint accepting observations (absent = log only)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Metric namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Location tag used when a record carries none
    #[serde(default = "default_location")]
    pub location: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            namespace: default_namespace(),
            location: default_location(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    "EcoFarm/Forecast".to_string()
}

fn default_location() -> String {
    "Samsamso Ecofarm".to_string()
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate a pipeline config from a YAML file
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    load_config_from_str(&content)
}

/// Load and validate a pipeline config from a YAML string
pub fn load_config_from_str(yaml: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse config YAML: {e}")))?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate a pipeline config
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.raw_bucket.is_empty() {
        return Err(Error::missing_field("raw_bucket"));
    }
    if config.processed_bucket.is_empty() {
        return Err(Error::missing_field("processed_bucket"));
    }
    if config.checkpoint_key.is_empty() {
        return Err(Error::missing_field("checkpoint_key"));
    }
    if config.time_dim_key.is_empty() {
        return Err(Error::missing_field("time_dim_key"));
    }
    if config.sources.is_empty() {
        return Err(Error::config("At least one source must be configured"));
    }

    let mut names = HashSet::new();
    for source in &config.sources {
        if source.name.is_empty() {
            return Err(Error::config("Source name cannot be empty"));
        }
        if !names.insert(source.name.as_str()) {
            return Err(Error::config(format!(
                "Duplicate source name: {}",
                source.name
            )));
        }
        if source.raw_prefix.is_empty() {
            return Err(Error::invalid_value(
                format!("sources.{}.raw_prefix", source.name),
                "prefix cannot be empty",
            ));
        }
        source.include_regex()?;
        for key in &source.surrogate_keys {
            if key.modulus == 0 {
                return Err(Error::invalid_value(
                    format!("sources.{}.surrogate_keys.{}", source.name, key.field),
                    "modulus must be positive",
                ));
            }
            if key.from.is_empty() {
                return Err(Error::invalid_value(
                    format!("sources.{}.surrogate_keys.{}", source.name, key.field),
                    "at least one natural key field is required",
                ));
            }
        }
    }

    let time_dim = &config.time_dimension;
    if time_dim.end < time_dim.start {
        return Err(Error::invalid_value(
            "time_dimension.end",
            format!("{} is before start {}", time_dim.end, time_dim.start),
        ));
    }
    if time_dim.job_timeout_secs == 0 {
        return Err(Error::invalid_value(
            "time_dimension.job_timeout_secs",
            "must be positive",
        ));
    }
    if time_dim.poll_interval_ms == 0 {
        return Err(Error::invalid_value(
            "time_dimension.poll_interval_ms",
            "must be positive",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
raw_bucket: s3://forecast-raw
processed_bucket: s3://forecast-processed
";
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.checkpoint_key, "checkpoints/forecast_etl.json");
        assert_eq!(config.time_dim_key, "forecast_data/time_dim/time_dim.json");
        assert_eq!(config.sources.len(), 8);
        assert_eq!(config.watermark_policy, WatermarkPolicy::MaxListed);
        assert!(!config.hive_partitioning);
        assert_eq!(
            config.time_dimension.start,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            config.time_dimension.end,
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_parse_sources() {
        let yaml = r"
raw_bucket: memory://raw
processed_bucket: memory://proc
watermark_policy: max_processed
sources:
  - name: forecast_fact
    raw_prefix: forecast_data/forecast_fact/
    include: '\.json$'
    metrics:
      - field: temperature_c
        name: TemperatureC
  - name: solar_time_dim
    raw_prefix: measured_data/solar_time_dim/
    output_prefix: processed/solar_time/
";
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.watermark_policy, WatermarkPolicy::MaxProcessed);
        assert_eq!(config.sources.len(), 2);

        let fact = config.source("forecast_fact").unwrap();
        assert_eq!(fact.output_prefix(), "forecast_data/forecast_fact");
        assert!(!fact.contributes_time_dim());
        assert_eq!(fact.metrics[0].unit, "None");
        assert!(fact.include_regex().unwrap().unwrap().is_match("a/b.json"));

        let solar = config.source("solar_time_dim").unwrap();
        assert_eq!(solar.output_prefix(), "processed/solar_time");
        assert!(solar.contributes_time_dim());
    }

    #[test]
    fn test_default_sources_shape() {
        let sources = PipelineConfig::default_sources();
        let time_dims: Vec<_> = sources
            .iter()
            .filter(|s| s.contributes_time_dim())
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            time_dims,
            vec![
                "download_time_dim",
                "forecast_time_dim",
                "solar_time_dim",
                "water_level_time_dim"
            ]
        );
    }

    #[test]
    fn test_reject_duplicate_source() {
        let config = PipelineConfig::new("memory://raw", "memory://proc").with_sources(vec![
            LogicalSource::new("a", "x/"),
            LogicalSource::new("a", "y/"),
        ]);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate source name"));
    }

    #[test]
    fn test_reject_bad_include() {
        let config = PipelineConfig::new("memory://raw", "memory://proc")
            .with_sources(vec![LogicalSource::new("a", "x/").with_include("(")]);
        assert!(matches!(
            validate_config(&config),
            Err(Error::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn test_reject_inverted_range() {
        let mut config = PipelineConfig::new("memory://raw", "memory://proc");
        config.time_dimension.end = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_reject_zero_job_timeout() {
        let yaml = r"
raw_bucket: memory://raw
processed_bucket: memory://proc
time_dimension:
  job_timeout_secs: 0
";
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("job_timeout_secs"), "got {err}");
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(matches!(load_config(&path), Err(Error::Io { .. })));
    }

    #[test]
    fn test_reject_zero_modulus() {
        let mut key = SurrogateKeyConfig::new("location_id", vec!["latitude".to_string()]);
        key.modulus = 0;
        let config = PipelineConfig::new("memory://raw", "memory://proc")
            .with_sources(vec![LogicalSource::new("loc", "loc/").with_surrogate_key(key)]);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_bucket() {
        let config = PipelineConfig::new("", "memory://proc");
        assert!(matches!(
            validate_config(&config),
            Err(Error::MissingConfigField { .. })
        ));
    }
}
