//! Time dimension types

use crate::decode::{coerce_record, format_datetime, time_id_from_parts, RecordParser};
use crate::error::Result;
use crate::types::JsonValue;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// One hour of the calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDimensionEntry {
    /// `YYYYMMDDHH` as an integer
    pub time_id: i64,
    /// Start of the hour, ISO-8601 UTC
    pub datetime: String,
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    pub hour: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    /// English weekday name, e.g. `Monday`
    pub weekday_name: String,
    pub is_weekend: bool,
}

impl TimeDimensionEntry {
    /// Build the entry for the hour containing `at`
    pub fn from_datetime(at: NaiveDateTime) -> Option<Self> {
        let hour_start = at.date().and_hms_opt(at.hour(), 0, 0)?;
        let time_id = time_id_from_parts(
            i64::from(at.year()),
            i64::from(at.month()),
            i64::from(at.day()),
            i64::from(at.hour()),
        )?;
        let weekday = at.weekday();

        Some(Self {
            time_id,
            datetime: format_datetime(&Utc.from_utc_datetime(&hour_start)),
            date: at.date().format("%Y-%m-%d").to_string(),
            hour: at.hour(),
            day: at.day(),
            month: at.month(),
            year: at.year(),
            weekday_name: weekday_name(weekday).to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        })
    }

    /// Rebuild the entry a `time_id` stands for; `None` if it is not a real hour
    pub fn from_time_id(time_id: i64) -> Option<Self> {
        if !(0..=9_999_123_123).contains(&time_id) {
            return None;
        }
        let hour = (time_id % 100) as u32;
        let day = (time_id / 100 % 100) as u32;
        let month = (time_id / 10_000 % 100) as u32;
        let year = (time_id / 1_000_000) as i32;

        let at = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
        Self::from_datetime(at)
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Calendar table, unique by `time_id`, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeDimension {
    entries: Vec<TimeDimensionEntry>,
    keys: HashSet<i64>,
}

impl TimeDimension {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries; the first entry for a key wins
    pub fn from_entries(entries: impl IntoIterator<Item = TimeDimensionEntry>) -> Self {
        let mut dim = Self::new();
        dim.extend(entries);
        dim
    }

    /// Insert an entry unless its key is already present
    pub fn insert(&mut self, entry: TimeDimensionEntry) -> bool {
        if !self.keys.insert(entry.time_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Insert many entries, returning how many were new
    pub fn extend(&mut self, entries: impl IntoIterator<Item = TimeDimensionEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if self.insert(entry) {
                added += 1;
            }
        }
        added
    }

    /// Whether a key is present
    pub fn contains(&self, time_id: i64) -> bool {
        self.keys.contains(&time_id)
    }

    /// Look up an entry by key
    pub fn get(&self, time_id: i64) -> Option<&TimeDimensionEntry> {
        if !self.contains(time_id) {
            return None;
        }
        self.entries.iter().find(|e| e.time_id == time_id)
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[TimeDimensionEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newline-delimited JSON, one entry per line
    pub fn to_ndjson(&self) -> Result<String> {
        let mut out = String::with_capacity(self.entries.len() * 160);
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Read a persisted table.
    ///
    /// Rows are rebuilt from their `time_id`, which may be stored as a number
    /// or a digit string. Rows without a usable key are skipped.
    pub fn from_ndjson(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }

        let mut dim = Self::new();
        for mut record in RecordParser::new().parse(bytes)? {
            coerce_record(&mut record);
            let entry = record
                .get("time_id")
                .and_then(JsonValue::as_i64)
                .and_then(TimeDimensionEntry::from_time_id);
            match entry {
                Some(entry) => {
                    dim.insert(entry);
                }
                None => warn!(row = ?record, "Skipping time dimension row without a valid time_id"),
            }
        }
        Ok(dim)
    }
}

/// Union of two tables by `time_id`; on conflict the existing entry is kept
pub fn merge(
    existing: TimeDimension,
    new_entries: impl IntoIterator<Item = TimeDimensionEntry>,
) -> TimeDimension {
    let mut merged = existing;
    merged.extend(new_entries);
    merged
}
