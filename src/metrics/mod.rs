//! Metrics module
//!
//! Publishes named numeric observations taken from transformed records.
//! Publishing is fire-and-forget: a sink never fails the run.
//!
//! # Overview
//!
//! The metrics module provides:
//! - `Observation` - one value tagged with a location and timestamp
//! - `MetricsSink` - where observations go
//! - `TracingMetricsSink`, `HttpMetricsSink`, `NoopMetricsSink` - sink implementations
//! - `observations_for` - extracts observations from records using metric bindings

mod sinks;
mod types;

pub use sinks::{sink_from_config, HttpMetricsSink, MetricsSink, NoopMetricsSink, TracingMetricsSink};
pub use types::{observations_for, Observation};

#[cfg(test)]
mod tests;
