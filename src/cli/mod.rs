//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `run` - Process new raw objects and commit the checkpoint
//! - `checkpoint show` / `checkpoint reset` - Inspect or rewind watermarks
//! - `time-dim generate` - Build the calendar table
//! - `validate` - Check the configuration
//! - `sources` - List configured sources

mod commands;
mod runner;

pub use commands::{CheckpointAction, Cli, Commands, OutputFormat, TimeDimAction};
pub use runner::Runner;
