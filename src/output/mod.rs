//! Output module
//!
//! Turns a source's parsed records into one partitioned NDJSON artifact per run.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Coercing, keying and deduplicating records (`transform_records`)
//! - Building date-partitioned output keys
//! - Writing an artifact in a single put (`PartitionWriter`)

mod partition;
mod transform;
mod writer;

pub use partition::{build_output_key, partition_date, run_file_name};
pub use transform::{dedup_records, transform_records};
pub use writer::{to_ndjson, OutputArtifact, PartitionWriter};
