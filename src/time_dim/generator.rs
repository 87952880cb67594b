//! Calendar generation

use super::types::{TimeDimension, TimeDimensionEntry};
use crate::decode::parse_datetime;
use crate::types::{JsonValue, ParsedRecord};
use chrono::{Duration, NaiveDate};
use tracing::debug;

/// Hourly calendar from `start` 00:00 through `end` 23:00, inclusive
pub fn generate_calendar(start: NaiveDate, end: NaiveDate) -> TimeDimension {
    let mut dim = TimeDimension::new();
    let (Some(mut current), Some(last)) = (start.and_hms_opt(0, 0, 0), end.and_hms_opt(23, 0, 0))
    else {
        return dim;
    };

    while current <= last {
        if let Some(entry) = TimeDimensionEntry::from_datetime(current) {
            dim.insert(entry);
        }
        current += Duration::hours(1);
    }

    debug!(%start, %end, entries = dim.len(), "Generated calendar");
    dim
}

/// Dimension rows carried by a time-dim source's records.
///
/// A record's `time_id` is preferred; a record without one falls back to its
/// `datetime`. Records with neither contribute nothing.
pub fn entries_from_records(records: &[ParsedRecord]) -> Vec<TimeDimensionEntry> {
    records
        .iter()
        .filter_map(|record| {
            let from_key = record
                .get("time_id")
                .and_then(JsonValue::as_i64)
                .and_then(TimeDimensionEntry::from_time_id);

            from_key.or_else(|| {
                record
                    .get("datetime")
                    .and_then(JsonValue::as_str)
                    .and_then(parse_datetime)
                    .and_then(|dt| TimeDimensionEntry::from_datetime(dt.naive_utc()))
            })
        })
        .collect()
}
