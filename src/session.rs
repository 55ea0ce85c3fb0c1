//! State of the prediction page.
//!
//! Every user action is a transition on [`PredictSession`]. Actions that call
//! the backend are split in two: `begin_*` validates and records what is in
//! flight, `finish_*` applies the response. The async drivers at the bottom of
//! this module glue the halves around the backend call, so no `RefCell` borrow
//! is ever held across an await.

use crate::backend::{Backend, BackendError};
use crate::cache::{CacheKey, ResultCache};
use crate::config::{QueryConfig, COPY_NOTICE_MS, NOTICE_MS};
use crate::distance::{Distance, DistanceFilter};
use crate::export::{predictions_csv, predictions_json, Clipboard, ExportError};
use crate::filter::{FilterForm, PredictFilter};
use crate::models::{Prediction, TimeRange};
use crate::query::{BuildError, QueryBuilder, QueryDescriptor};
use crate::reconstruct::{from_live_state, from_result_set};
use crate::time_window::{TimeFilter, TimeNormalizer};
use crate::validation::FieldErrors;
use jiff::Timestamp;
use log::{debug, info, warn};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Form,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Loaded,
    QueryFailed,
    Copied,
    CopyFailed,
}

impl NoticeKind {
    pub fn severity(&self) -> Severity {
        match self {
            NoticeKind::Loaded | NoticeKind::Copied => Severity::Success,
            NoticeKind::QueryFailed | NoticeKind::CopyFailed => Severity::Error,
        }
    }

    /// How long the notice stays up before it expires on its own.
    pub fn duration_ms(&self) -> u32 {
        match self {
            NoticeKind::Copied | NoticeKind::CopyFailed => COPY_NOTICE_MS,
            NoticeKind::Loaded | NoticeKind::QueryFailed => NOTICE_MS,
        }
    }
}

/// Transient message shown over the page.
///
/// `id` lets an expiry timer close only the notice it was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

/// Notice slot shared by both pages.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    pub fn show(&mut self, kind: NoticeKind, message: impl Into<String>) -> &Notice {
        self.next_id += 1;
        self.current.insert(Notice {
            id: self.next_id,
            kind,
            message: message.into(),
        })
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    /// Close the notice with `id`, leaving any newer notice up.
    pub fn expire(&mut self, id: u64) {
        if self.current.as_ref().is_some_and(|n| n.id == id) {
            self.current = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A backend call issued by this page is still outstanding.
    Busy,
    /// The form cannot be turned into a request.
    Invalid(BuildError),
    /// No tab at this index.
    UnknownTab(usize),
    /// Nothing is selected that could be copied.
    NothingToCopy,
    Backend(BackendError),
    Export(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Busy => write!(f, "A request is already running"),
            SessionError::Invalid(err) => write!(f, "{}", err),
            SessionError::UnknownTab(idx) => write!(f, "No time range tab at position {}", idx),
            SessionError::NothingToCopy => write!(f, "Nothing to copy yet"),
            SessionError::Backend(err) => write!(f, "{}", err),
            SessionError::Export(msg) => write!(f, "Export failed: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ExportError> for SessionError {
    fn from(err: ExportError) -> Self {
        SessionError::Export(err.to_string())
    }
}

/// A submission in flight.
#[derive(Debug, Clone)]
pub struct PendingSubmit {
    epoch: u64,
    pub query: QueryDescriptor,
}

/// A tab fetch in flight.
#[derive(Debug, Clone)]
pub struct PendingTab {
    epoch: u64,
    index: usize,
    key: CacheKey,
    pub window: TimeRange,
}

/// Outcome of selecting a tab.
#[derive(Debug)]
pub enum TabSelection {
    /// Served from the cache and already applied.
    Cached,
    /// Must be fetched, then handed to [`PredictSession::finish_tab`].
    Fetch(PendingTab),
}

/// Export formats of the results on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsFormat {
    Json,
    Csv,
}

#[derive(Debug)]
pub struct PredictSession {
    builder: QueryBuilder,
    filter: PredictFilter,
    distances: Vec<Distance>,
    errors: FieldErrors,
    cache: ResultCache<Vec<Prediction>>,
    time_ranges: Vec<TimeRange>,
    selected_tab: Option<usize>,
    predictions: Rc<Vec<Prediction>>,
    copy_input: Option<QueryDescriptor>,
    view: View,
    active: usize,
    loading: bool,
    notices: NoticeBoard,
    epoch: u64,
}

impl PredictSession {
    pub fn new(config: &QueryConfig, now: Timestamp) -> Self {
        let filter = PredictFilter::new(now, config);
        let distances = filter.distance.resolve(&config.catalog);
        Self {
            builder: QueryBuilder::new(config),
            filter,
            distances,
            errors: FieldErrors::default(),
            cache: ResultCache::new(),
            time_ranges: Vec::new(),
            selected_tab: None,
            predictions: Rc::new(Vec::new()),
            copy_input: None,
            view: View::Form,
            active: 0,
            loading: false,
            notices: NoticeBoard::default(),
            epoch: 0,
        }
    }

    pub fn filter(&self) -> &PredictFilter {
        &self.filter
    }

    /// Distances the current distance inputs resolve to.
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

    pub fn time_ranges(&self) -> &[TimeRange] {
        &self.time_ranges
    }

    pub fn selected_tab(&self) -> Option<usize> {
        self.selected_tab
    }

    pub fn predictions(&self) -> &Rc<Vec<Prediction>> {
        &self.predictions
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_prediction(&self) -> Option<&Prediction> {
        self.predictions.get(self.active)
    }

    /// Request behind the results on screen.
    pub fn copy_input(&self) -> Option<&QueryDescriptor> {
        self.copy_input.as_ref()
    }

    /// Request the form would submit right now, if any.
    pub fn candidate(&self) -> Option<QueryDescriptor> {
        from_live_state(&self.builder, &self.filter)
    }

    /// What the copy action would send: the shown request on the results
    /// view, the live form otherwise.
    pub fn export_query(&self) -> Option<QueryDescriptor> {
        match self.view {
            View::Results => self.copy_input.clone(),
            View::Form => self.candidate(),
        }
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

    pub fn cached_windows(&self) -> usize {
        self.cache.len()
    }

    pub fn begin_submit(&mut self) -> Result<PendingSubmit, SessionError> {
        if self.loading {
            return Err(SessionError::Busy);
        }
        let query = match self.builder.build(&self.filter) {
            Ok(query) => query,
            Err(BuildError::Invalid(errors)) => {
                self.errors = errors.clone();
                return Err(SessionError::Invalid(BuildError::Invalid(errors)));
            }
            Err(err) => {
                self.errors = FieldErrors::default();
                self.notices.show(NoticeKind::QueryFailed, err.to_string());
                return Err(SessionError::Invalid(err));
            }
        };
        self.errors = FieldErrors::default();
        self.loading = true;
        self.epoch += 1;
        Ok(PendingSubmit {
            epoch: self.epoch,
            query,
        })
    }

    pub fn finish_submit(
        &mut self,
        pending: PendingSubmit,
        result: Result<Vec<Prediction>, BackendError>,
    ) {
        self.loading = false;
        if pending.epoch != self.epoch {
            debug!("Dropping stale prediction response (epoch {})", pending.epoch);
            return;
        }
        match result {
            Ok(rows) => {
                info!("Loaded {} predictions", rows.len());
                let message = format!("Loaded {} races", rows.len());
                self.predictions = Rc::new(rows);
                self.copy_input = Some(pending.query);
                self.selected_tab = None;
                self.show_results();
                self.notices.show(NoticeKind::Loaded, message);
            }
            Err(err) => {
                warn!("Prediction run failed: {}", err);
                self.notices.show(NoticeKind::QueryFailed, err.to_string());
            }
        }
    }

    /// Show the rows of tab `index`, from the cache when possible.
    pub fn select_tab(&mut self, index: usize) -> Result<TabSelection, SessionError> {
        let window = self
            .time_ranges
            .get(index)
            .cloned()
            .ok_or(SessionError::UnknownTab(index))?;
        let key = CacheKey::from(&window);
        if let Some(rows) = self.cache.get(&key) {
            debug!("Tab {} served from cache", key);
            self.epoch += 1;
            self.apply_tab(index, &window, rows);
            return Ok(TabSelection::Cached);
        }
        if self.loading {
            return Err(SessionError::Busy);
        }
        self.loading = true;
        self.epoch += 1;
        Ok(TabSelection::Fetch(PendingTab {
            epoch: self.epoch,
            index,
            key,
            window,
        }))
    }

    pub fn finish_tab(&mut self, pending: PendingTab, result: Result<Vec<Prediction>, BackendError>) {
        self.loading = false;
        match result {
            Ok(rows) => {
                let rows = self.cache.put(pending.key, rows);
                if pending.epoch == self.epoch {
                    self.apply_tab(pending.index, &pending.window, rows);
                } else {
                    debug!("Tab {} fetched after the view moved on", pending.window.label());
                }
            }
            Err(err) if pending.epoch == self.epoch => {
                warn!("Loading tab {} failed: {}", pending.window.label(), err);
                self.notices.show(NoticeKind::QueryFailed, err.to_string());
            }
            Err(err) => debug!("Ignoring stale tab failure: {}", err),
        }
    }

    fn apply_tab(&mut self, index: usize, window: &TimeRange, rows: Rc<Vec<Prediction>>) {
        self.copy_input = match from_result_set(window, &rows) {
            Ok(query) => Some(query),
            Err(err) => {
                warn!("{}", err);
                None
            }
        };
        self.predictions = rows;
        self.selected_tab = Some(index);
        self.show_results();
    }

    fn show_results(&mut self) {
        self.view = View::Results;
        self.active = 0;
    }

    pub fn begin_copy(&self) -> Result<QueryDescriptor, SessionError> {
        self.export_query().ok_or(SessionError::NothingToCopy)
    }

    /// Record the outcome of a copy action.
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

    /// Text export of the results on screen.
    pub fn results_text(&self, format: ResultsFormat) -> Result<String, SessionError> {
        if self.view != View::Results {
            return Err(SessionError::NothingToCopy);
        }
        let text = match format {
            ResultsFormat::Json => predictions_json(&self.predictions)?,
            ResultsFormat::Csv => predictions_csv(&self.predictions)?,
        };
        Ok(text)
    }

    pub fn advance(&mut self) {
        if self.view == View::Results && self.active + 1 < self.predictions.len() {
            self.active += 1;
        }
    }

    pub fn retreat(&mut self) {
        if self.view == View::Results {
            self.active = self.active.saturating_sub(1);
        }
    }

    /// Return to the form. Responses still in flight are not applied.
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

    pub fn set_time_ranges(&mut self, ranges: Vec<TimeRange>) {
        self.selected_tab = None;
        self.time_ranges = ranges;
    }
}

impl FilterForm for PredictSession {
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

fn backend_outcome<T>(result: &Result<T, BackendError>) -> Result<(), SessionError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) => Err(SessionError::Backend(err.clone())),
    }
}

/// Validate the form, run the prediction and show its results.
pub async fn submit<B: Backend>(
    session: &RefCell<PredictSession>,
    backend: &B,
) -> Result<(), SessionError> {
    let pending = session.borrow_mut().begin_submit()?;
    let result = backend.run_predict(&pending.query).await;
    let outcome = backend_outcome(&result);
    session.borrow_mut().finish_submit(pending, result);
    outcome
}

/// Show tab `index`, fetching its rows on the first visit only.
pub async fn select_tab<B: Backend>(
    session: &RefCell<PredictSession>,
    backend: &B,
    index: usize,
) -> Result<(), SessionError> {
    let pending = match session.borrow_mut().select_tab(index)? {
        TabSelection::Cached => return Ok(()),
        TabSelection::Fetch(pending) => pending,
    };
    let result = backend.load_predictions(&pending.window).await;
    let outcome = backend_outcome(&result);
    session.borrow_mut().finish_tab(pending, result);
    outcome
}

/// Ask the backend for the serialized request and put it on the clipboard.
pub async fn copy_request<B: Backend, C: Clipboard>(
    session: &RefCell<PredictSession>,
    backend: &B,
    clipboard: &C,
) -> Result<(), SessionError> {
    let query = session.borrow().begin_copy()?;
    let written = match backend.copy_predict_request(&query).await {
        Ok(text) => clipboard.write_text(&text).await,
        Err(err) => Err(err.to_string()),
    };
    let outcome = written.clone().map_err(SessionError::Export);
    session.borrow_mut().finish_copy(written);
    outcome
}

/// Put the results on screen on the clipboard.
pub async fn copy_results<C: Clipboard>(
    session: &RefCell<PredictSession>,
    clipboard: &C,
    format: ResultsFormat,
) -> Result<(), SessionError> {
    let text = session.borrow().results_text(format)?;
    let written = clipboard.write_text(&text).await;
    let outcome = written.clone().map_err(SessionError::Export);
    session.borrow_mut().finish_copy(written);
    outcome
}

/// Fetch the tab list. Failures are logged and leave the tabs as they were.
pub async fn load_time_ranges<B: Backend>(
    session: &RefCell<PredictSession>,
    backend: &B,
) -> Result<(), SessionError> {
    match backend.load_time_ranges().await {
        Ok(ranges) => {
            debug!("Loaded {} time range tabs", ranges.len());
            session.borrow_mut().set_time_ranges(ranges);
            Ok(())
        }
        Err(err) => {
            warn!("Loading time ranges failed: {}", err);
            Err(SessionError::Backend(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Operation;
    use crate::distance::DistanceMode;
    use crate::models::RaceMeta;
    use crate::validation::Field;

    fn now() -> Timestamp {
        "2024-06-01T14:00:00Z".parse().unwrap()
    }

    fn session() -> PredictSession {
        PredictSession::new(&QueryConfig::default(), now())
    }

    fn rows(n: usize) -> Vec<Prediction> {
        (0..n)
            .map(|i| Prediction {
                meta: RaceMeta {
                    time: "14:00:00".into(),
                    distance: 480,
                    track: format!("Track {}", i),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect()
    }

    fn tabs() -> Vec<TimeRange> {
        vec![
            TimeRange {
                start_time: "14:00".into(),
                end_time: None,
            },
            TimeRange {
                start_time: "15:00".into(),
                end_time: Some("16:00".into()),
            },
        ]
    }

    #[test]
    fn successful_submit_shows_results_and_records_copy_input() {
        let mut s = session();
        let pending = s.begin_submit().unwrap();
        assert!(s.is_loading());
        assert_eq!(s.begin_submit().unwrap_err(), SessionError::Busy);

        let query = pending.query.clone();
        s.finish_submit(pending, Ok(rows(3)));
        assert!(!s.is_loading());
        assert_eq!(s.view(), View::Results);
        assert_eq!(s.predictions().len(), 3);
        assert_eq!(s.copy_input(), Some(&query));
        assert_eq!(s.notice().map(|n| n.kind), Some(NoticeKind::Loaded));
    }

    #[test]
    fn failed_submit_keeps_previous_state() {
        let mut s = session();
        let pending = s.begin_submit().unwrap();
        s.finish_submit(
            pending,
            Err(BackendError::invoke(Operation::RunPredict, "engine down")),
        );
        assert_eq!(s.view(), View::Form);
        assert!(s.predictions().is_empty());
        assert_eq!(s.copy_input(), None);
        let notice = s.notice().unwrap();
        assert_eq!(notice.kind.severity(), Severity::Error);
        assert!(notice.message.contains("engine down"));
    }

    #[test]
    fn invalid_form_records_field_errors() {
        let mut s = session();
        s.set_distance_mode(DistanceMode::Range);
        s.set_bounds(1000, 500);
        assert!(matches!(
            s.begin_submit(),
            Err(SessionError::Invalid(BuildError::Invalid(_)))
        ));
        assert!(s.errors().contains(Field::MinDistance));
        assert!(s.errors().contains(Field::MaxDistance));
        assert!(!s.is_loading());
        assert!(s.distances().is_empty());
    }

    #[test]
    fn back_makes_in_flight_response_stale() {
        let mut s = session();
        let pending = s.begin_submit().unwrap();
        s.back();
        s.finish_submit(pending, Ok(rows(2)));
        assert!(!s.is_loading());
        assert_eq!(s.view(), View::Form);
        assert!(s.predictions().is_empty());
    }

    #[test]
    fn advance_and_retreat_stay_in_bounds() {
        let mut s = session();
        let pending = s.begin_submit().unwrap();
        s.finish_submit(pending, Ok(rows(2)));
        s.retreat();
        assert_eq!(s.active_index(), 0);
        s.advance();
        s.advance();
        assert_eq!(s.active_index(), 1);
        assert_eq!(s.active_prediction().unwrap().meta.track, "Track 1");
    }

    #[test]
    fn tab_rows_are_cached_after_first_fetch() {
        let mut s = session();
        s.set_time_ranges(tabs());
        let pending = match s.select_tab(1).unwrap() {
            TabSelection::Fetch(p) => p,
            TabSelection::Cached => panic!("first visit must fetch"),
        };
        s.finish_tab(pending, Ok(rows(1)));
        assert_eq!(s.selected_tab(), Some(1));
        let first = s.copy_input().cloned();

        assert!(matches!(s.select_tab(1).unwrap(), TabSelection::Cached));
        assert_eq!(s.copy_input().cloned(), first);
        assert_eq!(s.cached_windows(), 1);
        assert_eq!(s.select_tab(7).unwrap_err(), SessionError::UnknownTab(7));
    }

    #[test]
    fn stale_tab_fetch_is_cached_but_not_shown() {
        let mut s = session();
        s.set_time_ranges(tabs());
        let pending = match s.select_tab(0).unwrap() {
            TabSelection::Fetch(p) => p,
            TabSelection::Cached => unreachable!(),
        };
        s.back();
        s.finish_tab(pending, Ok(rows(4)));
        assert_eq!(s.view(), View::Form);
        assert_eq!(s.cached_windows(), 1);
    }

    #[test]
    fn copy_uses_live_form_until_results_are_shown() {
        let mut s = session();
        assert_eq!(s.begin_copy().unwrap(), s.candidate().unwrap());
        s.set_fixed_time(None);
        assert_eq!(s.begin_copy().unwrap_err(), SessionError::NothingToCopy);
    }

    #[test]
    fn copy_failure_has_its_own_notice() {
        let mut s = session();
        s.finish_copy(Err("denied".into()));
        assert_eq!(s.notice().unwrap().kind, NoticeKind::CopyFailed);
        s.finish_copy(Ok(()));
        let notice = s.notice().unwrap().clone();
        assert_eq!(notice.kind, NoticeKind::Copied);
        assert_eq!(notice.kind.duration_ms(), COPY_NOTICE_MS);
    }

    #[test]
    fn expiry_only_closes_its_own_notice() {
        let mut board = NoticeBoard::default();
        let old = board.show(NoticeKind::Loaded, "one").id;
        let new = board.show(NoticeKind::Copied, "two").id;
        board.expire(old);
        assert_eq!(board.current().map(|n| n.id), Some(new));
        board.expire(new);
        assert!(board.current().is_none());
    }
}
