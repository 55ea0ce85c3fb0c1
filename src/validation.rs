//! Submission gate: per-field checks of the filter forms.
//!
//! Validation never touches the backend. A form may be submitted only when
//! the returned [`FieldErrors`] is empty.

use crate::config::MIN_ODDS;
use crate::distance::{Distance, DistanceCatalog, DistanceFilter, DistanceMode};
use crate::filter::{PredictFilter, StakeInputs, TestFilter};
use crate::time_window::{TimeFilter, TimeMode, TimeNormalizer};
use jiff::Timestamp;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Form inputs that can carry an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FixedTime,
    StartTime,
    EndTime,
    MinDistance,
    MaxDistance,
    Distances,
    Stake,
    Balance,
    OddsMin,
    OddsMax,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::FixedTime => "fixedTime",
            Field::StartTime => "startTime",
            Field::EndTime => "endTime",
            Field::MinDistance => "minDistance",
            Field::MaxDistance => "maxDistance",
            Field::Distances => "distances",
            Field::Stake => "stake",
            Field::Balance => "balance",
            Field::OddsMin => "oddsMin",
            Field::OddsMax => "oddsMax",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldFault {
    Missing,
    /// Range start is after its end; reported on both endpoints.
    RangeInverted,
    EmptySelection,
    UnknownDistance(Distance),
    NotPositive,
    BelowMinimum(f64),
    AboveMax,
    BelowMin,
}

impl fmt::Display for FieldFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldFault::Missing => write!(f, "Required"),
            FieldFault::RangeInverted => write!(f, "Start must not be after end"),
            FieldFault::EmptySelection => write!(f, "Select at least one distance"),
            FieldFault::UnknownDistance(d) => write!(f, "Unknown distance {}m", d),
            FieldFault::NotPositive => write!(f, "Must be > 0"),
            FieldFault::BelowMinimum(min) => write!(f, "Minimum {}", min),
            FieldFault::AboveMax => write!(f, "Must not exceed max"),
            FieldFault::BelowMin => write!(f, "Must not be below min"),
        }
    }
}

/// At most one fault per field, ordered by field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldErrors(BTreeMap<Field, FieldFault>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn get(&self, field: Field) -> Option<&FieldFault> {
        self.0.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldFault)> {
        self.0.iter().map(|(field, fault)| (*field, fault))
    }

    /// Later faults for the same field replace earlier ones.
    fn flag(&mut self, field: Field, fault: FieldFault) {
        self.0.insert(field, fault);
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, fault) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, fault)?;
            first = false;
        }
        Ok(())
    }
}

/// Checks the active time inputs. `inverted` decides whether a complete
/// range runs backwards.
fn check_time<F>(time: &TimeFilter, errors: &mut FieldErrors, inverted: F)
where
    F: Fn(Timestamp, Timestamp) -> bool,
{
    match time.mode {
        TimeMode::Fixed => {
            if time.fixed.is_none() {
                errors.flag(Field::FixedTime, FieldFault::Missing);
            }
        }
        TimeMode::Range => {
            if time.start.is_none() {
                errors.flag(Field::StartTime, FieldFault::Missing);
            }
            if time.end.is_none() {
                errors.flag(Field::EndTime, FieldFault::Missing);
            }
            if let (Some(start), Some(end)) = (time.start, time.end) {
                if inverted(start, end) {
                    errors.flag(Field::StartTime, FieldFault::RangeInverted);
                    errors.flag(Field::EndTime, FieldFault::RangeInverted);
                }
            }
        }
    }
}

fn check_distance(distance: &DistanceFilter, catalog: &DistanceCatalog, errors: &mut FieldErrors) {
    match distance.mode {
        DistanceMode::All => {}
        DistanceMode::Range => {
            if distance.min > distance.max {
                errors.flag(Field::MinDistance, FieldFault::AboveMax);
                errors.flag(Field::MaxDistance, FieldFault::BelowMin);
            }
        }
        DistanceMode::Explicit => {
            if distance.explicit.is_empty() {
                errors.flag(Field::Distances, FieldFault::EmptySelection);
            } else if let Some(unknown) = distance
                .explicit
                .iter()
                .copied()
                .find(|d| !catalog.contains(*d))
            {
                errors.flag(Field::Distances, FieldFault::UnknownDistance(unknown));
            }
        }
    }
}

fn check_positive(value: Option<f64>, field: Field, errors: &mut FieldErrors) -> Option<f64> {
    match value {
        Some(v) if v > 0.0 => Some(v),
        _ => {
            errors.flag(field, FieldFault::NotPositive);
            None
        }
    }
}

fn check_stake(stake: &StakeInputs, errors: &mut FieldErrors) {
    check_positive(stake.initial_stake, Field::Stake, errors);
    check_positive(stake.initial_balance, Field::Balance, errors);

    let odds_min = check_positive(stake.odds_min, Field::OddsMin, errors);
    if let Some(low) = odds_min {
        if low < MIN_ODDS {
            errors.flag(Field::OddsMin, FieldFault::BelowMinimum(MIN_ODDS));
        }
    }
    let odds_max = check_positive(stake.odds_max, Field::OddsMax, errors);

    if let (Some(low), Some(high)) = (odds_min, odds_max) {
        if low > high {
            errors.flag(Field::OddsMin, FieldFault::AboveMax);
            errors.flag(Field::OddsMax, FieldFault::BelowMin);
        }
    }
}

/// Prediction requests carry only times of day, so the range is ordered by
/// its wall-clock times in the domain zone. A range that crosses midnight is
/// inverted.
pub fn validate_prediction_filter(
    filter: &PredictFilter,
    catalog: &DistanceCatalog,
    normalizer: &TimeNormalizer,
) -> FieldErrors {
    let mut errors = FieldErrors::default();
    check_time(&filter.time, &mut errors, |start, end| {
        normalizer.wall_clock(start).time() > normalizer.wall_clock(end).time()
    });
    check_distance(&filter.distance, catalog, &mut errors);
    errors
}

pub fn validate_test_filter(filter: &TestFilter, catalog: &DistanceCatalog) -> FieldErrors {
    let mut errors = FieldErrors::default();
    check_time(&filter.time, &mut errors, |start, end| start > end);
    check_distance(&filter.distance, catalog, &mut errors);
    check_stake(&filter.stake, &mut errors);
    errors
}
