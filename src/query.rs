//! Query descriptors: the immutable request shapes sent to the prediction and
//! back-testing engine.

use crate::config::QueryConfig;
use crate::distance::{resolve, Distance, DistanceCatalog, DistanceSelection};
use crate::filter::{PredictFilter, TestFilter};
use crate::models::OddsRange;
use crate::time_window::{PredictTime, TestDateTime, TimeNormalizer, TimeSpec};
use crate::validation::{validate_prediction_filter, validate_test_filter, FieldErrors};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical `run_predict` input.
///
/// Holds only wire values, so two descriptors compare equal exactly when
/// their serialized forms do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub time: PredictTime,
    pub distances: Vec<Distance>,
}

impl QueryDescriptor {
    /// Pretty JSON of the request, as shown to the user when copying it.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&PredictRequest { input: self })
    }
}

/// Argument envelope the backend expects around a [`QueryDescriptor`].
#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub input: &'a QueryDescriptor,
}

/// Canonical `run_test` input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuery {
    pub date_time: TestDateTime,
    pub distances: Vec<Distance>,
    pub initial_stake: f64,
    pub initial_balance: f64,
    pub is_favorite_protected: bool,
    pub odds_range: OddsRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    Invalid(FieldErrors),
    /// A required time input was cleared; validation reports which one.
    IncompleteTime,
    /// The filter is valid but no catalog distance matches it.
    NoDistances,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Invalid(errors) => write!(f, "Invalid filter: {}", errors),
            BuildError::IncompleteTime => write!(f, "Time window is incomplete"),
            BuildError::NoDistances => write!(f, "No known distance matches the filter"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Composes the time normalizer and the distance resolver.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    normalizer: TimeNormalizer,
    catalog: DistanceCatalog,
}

impl QueryBuilder {
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            normalizer: TimeNormalizer::new(config.time_zone.clone()),
            catalog: config.catalog.clone(),
        }
    }

    pub fn normalizer(&self) -> &TimeNormalizer {
        &self.normalizer
    }

    pub fn catalog(&self) -> &DistanceCatalog {
        &self.catalog
    }

    fn distances(&self, selection: &DistanceSelection) -> Result<Vec<Distance>, BuildError> {
        let distances = resolve(selection, &self.catalog);
        if distances.is_empty() {
            return Err(BuildError::NoDistances);
        }
        Ok(distances)
    }

    /// Normalize and resolve already-validated parts.
    pub fn compose(
        &self,
        time: &TimeSpec,
        selection: &DistanceSelection,
    ) -> Result<QueryDescriptor, BuildError> {
        let distances = self.distances(selection)?;
        Ok(QueryDescriptor {
            time: self.normalizer.predict_time(time),
            distances,
        })
    }

    pub fn build(&self, filter: &PredictFilter) -> Result<QueryDescriptor, BuildError> {
        let errors = validate_prediction_filter(filter, &self.catalog, &self.normalizer);
        if !errors.is_empty() {
            debug!("Prediction filter rejected: {}", errors);
            return Err(BuildError::Invalid(errors));
        }
        let time = filter.time.spec().ok_or(BuildError::IncompleteTime)?;
        let descriptor = self.compose(&time, &filter.distance.selection())?;
        debug!(
            "Built prediction query: {:?} over {} distances",
            descriptor.time,
            descriptor.distances.len()
        );
        Ok(descriptor)
    }

    pub fn build_test(&self, filter: &TestFilter) -> Result<TestQuery, BuildError> {
        let errors = validate_test_filter(filter, &self.catalog);
        if !errors.is_empty() {
            debug!("Test filter rejected: {}", errors);
            return Err(BuildError::Invalid(errors));
        }
        let time = filter.time.spec().ok_or(BuildError::IncompleteTime)?;
        let distances = self.distances(&filter.distance.selection())?;
        let stake = &filter.stake;
        Ok(TestQuery {
            date_time: self.normalizer.test_date_time(&time),
            distances,
            initial_stake: stake.initial_stake.unwrap_or_default(),
            initial_balance: stake.initial_balance.unwrap_or_default(),
            is_favorite_protected: stake.favorite_protected,
            odds_range: OddsRange {
                low: stake.odds_min.unwrap_or_default(),
                high: stake.odds_max.unwrap_or_default(),
            },
        })
    }
}
