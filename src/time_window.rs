//! Time window filter state and its normalization into the wire formats the
//! backend accepts.
//!
//! # Wire formats
//! - predictions: wall-clock times, `HH:MM:SS`
//! - test runs: wall-clock date-times, `YYYY-MM-DDTHH:MM:SS`
//!
//! Both are expressed in the domain time zone handed to [`TimeNormalizer`],
//! truncated to whole seconds.

use jiff::civil::{self, Date, DateTime, Time};
use jiff::tz::TimeZone;
use jiff::{Timestamp, ToSpan};
use serde::{Deserialize, Serialize};
use std::fmt;

/// When the races of interest happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    Fixed(Timestamp),
    Range { start: Timestamp, end: Timestamp },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    #[default]
    Fixed,
    Range,
}

/// Time inputs as the form holds them; any of them may be cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFilter {
    pub mode: TimeMode,
    pub fixed: Option<Timestamp>,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeFilter {
    /// Fixed mode at `now`, with the range preset to the hour starting at `now`.
    pub fn starting_at(now: Timestamp, range_hours: i64) -> Self {
        Self {
            mode: TimeMode::Fixed,
            fixed: Some(now),
            start: Some(now),
            end: now.checked_add(range_hours.hours()).ok(),
        }
    }

    /// The active time spec, or `None` while a required input is missing.
    pub fn spec(&self) -> Option<TimeSpec> {
        match self.mode {
            TimeMode::Fixed => self.fixed.map(TimeSpec::Fixed),
            TimeMode::Range => match (self.start, self.end) {
                (Some(start), Some(end)) => Some(TimeSpec::Range { start, end }),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBounds {
    pub start_time: Time,
    pub end_time: Time,
}

/// Time part of a `run_predict` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredictTime {
    FixedTime(Time),
    RangeTime(TimeBounds),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeBounds {
    pub start_date_time: DateTime,
    pub end_date_time: DateTime,
}

/// Time part of a `run_test` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestDateTime {
    FixedDateTime(DateTime),
    RangeDateTime(DateTimeBounds),
}

#[derive(Debug)]
pub enum TimeError {
    /// The wall-clock value does not exist in the configured zone.
    Unrepresentable { wall_clock: DateTime, reason: String },
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeError::Unrepresentable { wall_clock, reason } => {
                write!(f, "Cannot place {} in the domain time zone: {}", wall_clock, reason)
            }
        }
    }
}

impl std::error::Error for TimeError {}

#[inline]
fn truncate_to_second(dt: DateTime) -> DateTime {
    civil::datetime(
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        0,
    )
}

/// Projects instants into the domain time zone.
#[derive(Debug, Clone)]
pub struct TimeNormalizer {
    tz: TimeZone,
}

impl TimeNormalizer {
    pub fn new(tz: TimeZone) -> Self {
        Self { tz }
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.tz
    }

    /// Wall-clock value of `ts` in the domain zone, whole seconds only.
    pub fn wall_clock(&self, ts: Timestamp) -> DateTime {
        truncate_to_second(ts.to_zoned(self.tz.clone()).datetime())
    }

    /// Instant at which the domain zone shows `wall_clock`.
    pub fn from_wall_clock(&self, wall_clock: DateTime) -> Result<Timestamp, TimeError> {
        wall_clock
            .to_zoned(self.tz.clone())
            .map(|z| z.timestamp())
            .map_err(|e| TimeError::Unrepresentable {
                wall_clock,
                reason: e.to_string(),
            })
    }

    /// Wall-clock bounds of `spec`.
    ///
    /// # Panics
    /// Panics if a range ends before it starts. Validation rejects such ranges
    /// before they reach normalization.
    fn wall_clock_bounds(&self, spec: &TimeSpec) -> (DateTime, Option<DateTime>) {
        match *spec {
            TimeSpec::Fixed(at) => (self.wall_clock(at), None),
            TimeSpec::Range { start, end } => {
                assert!(
                    start <= end,
                    "time range reached normalization inverted: {} > {}",
                    start,
                    end
                );
                (self.wall_clock(start), Some(self.wall_clock(end)))
            }
        }
    }

    /// # Panics
    /// Panics if the range's time of day in the domain zone runs backwards,
    /// which happens when it crosses midnight.
    pub fn predict_time(&self, spec: &TimeSpec) -> PredictTime {
        match self.wall_clock_bounds(spec) {
            (at, None) => PredictTime::FixedTime(at.time()),
            (start, Some(end)) => {
                assert!(
                    start.time() <= end.time(),
                    "prediction range reached normalization inverted: {} > {}",
                    start.time(),
                    end.time()
                );
                PredictTime::RangeTime(TimeBounds {
                    start_time: start.time(),
                    end_time: end.time(),
                })
            }
        }
    }

    /// Last whole second of the domain-zone day containing `ts`.
    pub fn end_of_day(&self, ts: Timestamp) -> Result<Timestamp, TimeError> {
        self.from_wall_clock(self.wall_clock(ts).date().at(23, 59, 59, 0))
    }

    pub fn test_date_time(&self, spec: &TimeSpec) -> TestDateTime {
        match self.wall_clock_bounds(spec) {
            (at, None) => TestDateTime::FixedDateTime(at),
            (start, Some(end)) => TestDateTime::RangeDateTime(DateTimeBounds {
                start_date_time: start,
                end_date_time: end,
            }),
        }
    }

    /// Rebuild a spec from a prediction wire time, placing it on `date`.
    pub fn to_time_spec(&self, wire: &PredictTime, date: Date) -> Result<TimeSpec, TimeError> {
        match *wire {
            PredictTime::FixedTime(at) => {
                Ok(TimeSpec::Fixed(self.from_wall_clock(date.to_datetime(at))?))
            }
            PredictTime::RangeTime(TimeBounds {
                start_time,
                end_time,
            }) => Ok(TimeSpec::Range {
                start: self.from_wall_clock(date.to_datetime(start_time))?,
                end: self.from_wall_clock(date.to_datetime(end_time))?,
            }),
        }
    }
}
