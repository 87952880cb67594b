//! Time dimension module
//!
//! A single hourly calendar table, keyed by `time_id` (`YYYYMMDDHH` as an
//! integer) and shared by every source that carries calendar fields.
//!
//! # Overview
//!
//! The time_dim module provides:
//! - `TimeDimensionEntry` / `TimeDimension` - the table, deduplicated by key
//! - `generate_calendar` - an inclusive hourly range between two dates
//! - `CalendarJob` - the (possibly external) job that creates the table
//! - `TimeDimensionResolver` - load, generate on absence, merge, commit

mod generator;
mod job;
mod resolver;
mod types;

pub use generator::{entries_from_records, generate_calendar};
pub use job::{CalendarJob, JobStatus, LocalCalendarJob};
pub use resolver::TimeDimensionResolver;
pub use types::{merge, TimeDimension, TimeDimensionEntry};
