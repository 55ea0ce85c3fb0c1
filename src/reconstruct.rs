//! Re-deriving the request behind what the user is looking at, for the
//! copy/export actions.

use crate::distance::Distance;
use crate::filter::PredictFilter;
use crate::models::{Prediction, TimeRange};
use crate::query::{QueryBuilder, QueryDescriptor};
use crate::time_window::{PredictTime, TimeBounds};
use crate::utils::{parse_tab_time, TimeParseError};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconstructError {
    BadTabTime { value: String, cause: TimeParseError },
}

impl fmt::Display for ReconstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructError::BadTabTime { value, cause } => {
                write!(f, "Time range tab has unusable time '{}': {}", value, cause)
            }
        }
    }
}

impl std::error::Error for ReconstructError {}

/// The descriptor the current form would submit, if it is submittable.
pub fn from_live_state(builder: &QueryBuilder, filter: &PredictFilter) -> Option<QueryDescriptor> {
    builder.build(filter).ok()
}

fn tab_time(value: &str) -> Result<jiff::civil::Time, ReconstructError> {
    parse_tab_time(value).map_err(|cause| ReconstructError::BadTabTime {
        value: value.to_string(),
        cause,
    })
}

/// Distinct distances of `results`, in order of first appearance.
pub fn distinct_distances(results: &[Prediction]) -> Vec<Distance> {
    let mut seen = HashSet::new();
    results
        .iter()
        .map(|p| p.meta.distance)
        .filter(|d| seen.insert(*d))
        .collect()
}

/// A descriptor that reproduces exactly the rows of a time-range tab.
///
/// The filter that originally produced the rows may have named more
/// distances than the rows contain; only the distances actually present are
/// kept, which selects the same races.
pub fn from_result_set(
    tab: &TimeRange,
    results: &[Prediction],
) -> Result<QueryDescriptor, ReconstructError> {
    let start = tab_time(&tab.start_time)?;
    let time = match &tab.end_time {
        Some(end) => PredictTime::RangeTime(TimeBounds {
            start_time: start,
            end_time: tab_time(end)?,
        }),
        None => PredictTime::FixedTime(start),
    };
    Ok(QueryDescriptor {
        time,
        distances: distinct_distances(results),
    })
}
