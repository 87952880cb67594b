// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # EcoFarm ETL
//!
//! Incremental, checkpointed ETL for weather forecasts and farm sensor
//! readings landed as raw JSON in object storage.
//!
//! ## Features
//!
//! - **Incremental Reads**: Per-source watermarks so each run only sees new objects
//! - **Tolerant Parsing**: JSON arrays, NDJSON and single objects
//! - **Time Dimension**: Shared hourly calendar keyed by `YYYYMMDDHH`
//! - **Partitioned Output**: One NDJSON artifact per source per run
//! - **Any Object Store**: S3, R2, GCS, Azure, local disk or memory
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ecofarm_etl::{EtlPipeline, PipelineConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::new("s3://farm-raw", "s3://farm-processed");
//!     let pipeline = EtlPipeline::from_config(config)?;
//!
//!     let summary = pipeline.run(chrono::Utc::now()).await?;
//!     println!("{} records written", summary.records_written());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         EtlPipeline::run                        │
//! │  load checkpoint → resolve time dim → per source → commit       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Listing  │  Decode   │    Output     │ Time Dim  │    State    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Prefix   │ Array     │ Coerce        │ Calendar  │ Watermarks  │
//! │ Strict > │ NDJSON    │ Surrogate key │ Merge     │ Delta merge │
//! │ Sorted   │ Object    │ Dedup, NDJSON │ Job wait  │ Single put  │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the pipeline
pub mod error;

/// Common types and type aliases
pub mod types;

/// Pipeline configuration
pub mod config;

/// Object storage abstraction
pub mod storage;

/// Checkpoint persistence
pub mod state;

/// Incremental source listing
pub mod listing;

/// Raw object parsing and field coercion
pub mod decode;

/// Time dimension generation and merging
pub mod time_dim;

/// Transformation and partitioned output
pub mod output;

/// Deterministic surrogate keys
pub mod keys;

/// Metric observations
pub mod metrics;

/// Main execution engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{load_config, load_config_from_str, LogicalSource, PipelineConfig};
pub use engine::{EtlPipeline, RunSummary, SourceReport};
pub use state::{Checkpoint, CheckpointStore};
pub use storage::{open_storage, MemoryStorage, ObjectStoreStorage, Storage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
