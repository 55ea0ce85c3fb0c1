//! State of the back-testing page.
//!
//! Same shape as [`crate::session::PredictSession`]: a run is begun, sent, and
//! finished in three steps so the session is never borrowed across the call.

use crate::backend::{Backend, BackendError};
use crate::config::QueryConfig;
use crate::distance::{Distance, DistanceFilter};
use crate::export::{races_json, requests_json, Clipboard, RaceExport};
use crate::filter::{FilterForm, StakeInputs, TestFilter};
use crate::models::{TestRace, TestResults};
use crate::query::{BuildError, QueryBuilder, TestQuery};
use crate::session::{Notice, NoticeBoard, NoticeKind, SessionError, View};
use crate::time_window::{TimeFilter, TimeNormalizer};
use crate::validation::FieldErrors;
use jiff::Timestamp;
use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::Rc;

/// Payloads a finished back-test can be copied as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestExport {
    Model,
    Real,
    Requests,
}

#[derive(Debug, Clone)]
pub struct PendingRun {
    epoch: u64,
    pub query: TestQuery,
}

#[derive(Debug)]
pub struct BacktestSession {
    builder: QueryBuilder,
    filter: TestFilter,
    distances: Vec<Distance>,
    errors: FieldErrors,
    results: Option<Rc<TestResults>>,
    last_query: Option<TestQuery>,
    view: View,
    active: usize,
    loading: bool,
    notices: NoticeBoard,
    epoch: u64,
}

impl BacktestSession {
    pub fn new(config: &QueryConfig, now: Timestamp) -> Self {
        let filter = TestFilter::new(now, config);
        let distances = filter.distance.resolve(&config.catalog);
        Self {
            builder: QueryBuilder::new(config),
            filter,
            distances,
            errors: FieldErrors::default(),
            results: None,
            last_query: None,
            view: View::Form,
            active: 0,
            loading: false,
            notices: NoticeBoard::default(),
            epoch: 0,
        }
    }

    pub fn filter(&self) -> &TestFilter {
        &self.filter
    }

    pub fn distances(&self) -> &[Distance] {
        &self.distances
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn normalizer(&self) -> &TimeNormalizer {
        self.builder.normalizer()
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn results(&self) -> Option<&Rc<TestResults>> {
        self.results.as_ref()
    }

    /// The request behind the results on screen.
    pub fn last_query(&self) -> Option<&TestQuery> {
        self.last_query.as_ref()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_race(&self) -> Option<&TestRace> {
        self.results.as_ref()?.races.get(self.active)
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notices.current()
    }

    pub fn set_stake(&mut self, stake: StakeInputs) {
        self.filter.stake = stake;
    }

    pub fn set_initial_stake(&mut self, value: Option<f64>) {
        self.filter.stake.initial_stake = value;
    }

    pub fn set_initial_balance(&mut self, value: Option<f64>) {
        self.filter.stake.initial_balance = value;
    }

    pub fn set_odds_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.filter.stake.odds_min = min;
        self.filter.stake.odds_max = max;
    }

    pub fn set_favorite_protected(&mut self, protected: bool) {
        self.filter.stake.favorite_protected = protected;
    }

    pub fn begin_run(&mut self) -> Result<PendingRun, SessionError> {
        if self.loading {
            return Err(SessionError::Busy);
        }
        let query = match self.builder.build_test(&self.filter) {
            Ok(query) => query,
            Err(err) => {
                self.errors = match &err {
                    BuildError::Invalid(errors) => errors.clone(),
                    _ => {
                        self.notices.show(NoticeKind::QueryFailed, err.to_string());
                        FieldErrors::default()
                    }
                };
                return Err(SessionError::Invalid(err));
            }
        };
        self.errors = FieldErrors::default();
        self.loading = true;
        self.epoch += 1;
        Ok(PendingRun {
            epoch: self.epoch,
            query,
        })
    }

    pub fn finish_run(&mut self, pending: PendingRun, result: Result<TestResults, BackendError>) {
        self.loading = false;
        if pending.epoch != self.epoch {
            debug!("Dropping stale back-test response (epoch {})", pending.epoch);
            return;
        }
        match result {
            Ok(results) => {
                let meta = &results.meta;
                info!(
                    "Back-test finished: {} races, balance {:.2} -> {:.2}",
                    meta.race_count.total_races, meta.balance.initial_balance, meta.balance.final_balance
                );
                let message = format!("Tested {} races", results.races.len());
                self.results = Some(Rc::new(results));
                self.last_query = Some(pending.query);
                self.view = View::Results;
                self.active = 0;
                self.notices.show(NoticeKind::Loaded, message);
            }
            Err(err) => {
                warn!("Back-test failed: {}", err);
                self.notices.show(NoticeKind::QueryFailed, err.to_string());
            }
        }
    }

    pub fn export_text(&self, export: TestExport) -> Result<String, SessionError> {
        let results = self.results.as_ref().ok_or(SessionError::NothingToCopy)?;
        let text = match export {
            TestExport::Model => races_json(results, RaceExport::Model)?,
            TestExport::Real => races_json(results, RaceExport::Real)?,
            TestExport::Requests => requests_json(results)?,
        };
        Ok(text)
    }

    pub fn finish_copy(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.notices.show(NoticeKind::Copied, "Copied to clipboard");
            }
            Err(err) => {
                warn!("Copy failed: {}", err);
                self.notices.show(NoticeKind::CopyFailed, format!("Copy failed: {}", err));
            }
        }
    }

    pub fn advance(&mut self) {
        let len = self.results.as_ref().map_or(0, |r| r.races.len());
        if self.view == View::Results && self.active + 1 < len {
            self.active += 1;
        }
    }

    pub fn retreat(&mut self) {
        if self.view == View::Results {
            self.active = self.active.saturating_sub(1);
        }
    }

    pub fn back(&mut self) {
        self.view = View::Form;
        self.active = 0;
        self.epoch += 1;
    }

    pub fn dismiss_notice(&mut self) {
        self.notices.dismiss();
    }

    pub fn expire_notice(&mut self, id: u64) {
        self.notices.expire(id);
    }
}

impl FilterForm for BacktestSession {
    fn time_filter_mut(&mut self) -> &mut TimeFilter {
        &mut self.filter.time
    }

    fn distance_filter_mut(&mut self) -> &mut DistanceFilter {
        &mut self.filter.distance
    }

    fn distances_changed(&mut self) {
        self.distances = self.filter.distance.resolve(self.builder.catalog());
    }
}

/// Validate the form and run the back-test.
pub async fn run<B: Backend>(
    session: &RefCell<BacktestSession>,
    backend: &B,
) -> Result<(), SessionError> {
    let pending = session.borrow_mut().begin_run()?;
    let result = backend.run_test(&pending.query).await;
    let outcome = match &result {
        Ok(_) => Ok(()),
        Err(err) => Err(SessionError::Backend(err.clone())),
    };
    session.borrow_mut().finish_run(pending, result);
    outcome
}

pub async fn copy_export<C: Clipboard>(
    session: &RefCell<BacktestSession>,
    clipboard: &C,
    export: TestExport,
) -> Result<(), SessionError> {
    let text = session.borrow().export_text(export)?;
    let written = clipboard.write_text(&text).await;
    let outcome = written.clone().map_err(SessionError::Export);
    session.borrow_mut().finish_copy(written);
    outcome
}
