//! Filter state held by the prediction and test-run forms.

use crate::config::{QueryConfig, DEFAULT_RANGE_HOURS};
use crate::distance::{Distance, DistanceFilter, DistanceMode};
use crate::time_window::{TimeFilter, TimeMode, TimeNormalizer};
use jiff::Timestamp;

#[derive(Debug, Clone, PartialEq)]
pub struct PredictFilter {
    pub time: TimeFilter,
    pub distance: DistanceFilter,
}

impl PredictFilter {
    /// Range preset ends no later than midnight in the domain zone.
    pub fn new(now: Timestamp, config: &QueryConfig) -> Self {
        let mut time = TimeFilter::starting_at(now, DEFAULT_RANGE_HOURS);
        let normalizer = TimeNormalizer::new(config.time_zone.clone());
        if let (Some(end), Ok(last)) = (time.end, normalizer.end_of_day(now)) {
            time.end = Some(end.min(last).max(now));
        }
        Self {
            time,
            distance: DistanceFilter::new(&config.catalog),
        }
    }
}

/// Money and odds inputs of a back-test. Empty inputs are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StakeInputs {
    pub initial_stake: Option<f64>,
    pub initial_balance: Option<f64>,
    pub odds_min: Option<f64>,
    pub odds_max: Option<f64>,
    pub favorite_protected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestFilter {
    pub time: TimeFilter,
    pub distance: DistanceFilter,
    pub stake: StakeInputs,
}

impl TestFilter {
    pub fn new(now: Timestamp, config: &QueryConfig) -> Self {
        Self {
            time: TimeFilter::starting_at(now, DEFAULT_RANGE_HOURS),
            distance: DistanceFilter::new(&config.catalog),
            stake: StakeInputs::default(),
        }
    }
}

/// Edits shared by every filter form.
///
/// Implementors expose their time and distance inputs; the provided methods
/// are the transitions. Derived distance lists are refreshed through
/// [`FilterForm::distances_changed`] after every distance edit.
pub trait FilterForm {
    fn time_filter_mut(&mut self) -> &mut TimeFilter;

    fn distance_filter_mut(&mut self) -> &mut DistanceFilter;

    fn distances_changed(&mut self);

    fn set_time_mode(&mut self, mode: TimeMode) {
        self.time_filter_mut().mode = mode;
    }

    fn set_fixed_time(&mut self, at: Option<Timestamp>) {
        self.time_filter_mut().fixed = at;
    }

    fn set_range_time(&mut self, start: Option<Timestamp>, end: Option<Timestamp>) {
        let time = self.time_filter_mut();
        time.start = start;
        time.end = end;
    }

    fn set_distance_mode(&mut self, mode: DistanceMode) {
        self.distance_filter_mut().mode = mode;
        self.distances_changed();
    }

    fn set_bounds(&mut self, min: Distance, max: Distance) {
        let distance = self.distance_filter_mut();
        distance.min = min;
        distance.max = max;
        self.distances_changed();
    }

    fn set_explicit(&mut self, set: Vec<Distance>) {
        self.distance_filter_mut().explicit = set;
        self.distances_changed();
    }
}
