use futures::executor::block_on;
use jiff::civil::time;
use jiff::tz::TimeZone;
use race_query::backend::{Backend, BackendError, Operation};
use race_query::backtest::{self, BacktestSession, TestExport};
use race_query::distance::{DistanceCatalog, DistanceMode};
use race_query::export::Clipboard;
use race_query::filter::{FilterForm, StakeInputs};
use race_query::models::{
    Instruction, ModelSettings, Prediction, RaceMeta, SaveSettings, TestRace, TestResults,
    TimeRange,
};
use race_query::query::{QueryDescriptor, TestQuery};
use race_query::session::{self, NoticeKind, PredictSession, SessionError, View};
use race_query::time_window::{PredictTime, TimeMode};
use race_query::validation::Field;
use race_query::QueryConfig;
use std::cell::{Cell, RefCell};

/// Backend that serves canned rows and counts every call.
#[derive(Default)]
struct CountingBackend {
    predict_calls: Cell<usize>,
    load_calls: Cell<usize>,
    test_calls: Cell<usize>,
    fail: Cell<bool>,
    last_window: RefCell<Option<TimeRange>>,
}

fn race(time: &str, distance: u16) -> Prediction {
    Prediction {
        meta: RaceMeta {
            date: "2024-06-01".into(),
            time: time.into(),
            distance,
            track: "Romford".into(),
            grade: Some("A2".into()),
        },
        ..Default::default()
    }
}

impl CountingBackend {
    fn failure(&self, operation: Operation) -> Result<(), BackendError> {
        if self.fail.get() {
            return Err(BackendError::invoke(operation, "engine unavailable"));
        }
        Ok(())
    }
}

impl Backend for CountingBackend {
    async fn load_time_ranges(&self) -> Result<Vec<TimeRange>, BackendError> {
        self.failure(Operation::LoadTimeRanges)?;
        Ok(vec![
            TimeRange {
                start_time: "14:00".into(),
                end_time: None,
            },
            TimeRange {
                start_time: "15:00".into(),
                end_time: Some("16:30".into()),
            },
        ])
    }

    async fn run_predict(&self, query: &QueryDescriptor) -> Result<Vec<Prediction>, BackendError> {
        self.predict_calls.set(self.predict_calls.get() + 1);
        self.failure(Operation::RunPredict)?;
        Ok(query
            .distances
            .iter()
            .take(2)
            .map(|d| race("14:00:00", *d))
            .collect())
    }

    async fn load_predictions(&self, window: &TimeRange) -> Result<Vec<Prediction>, BackendError> {
        self.load_calls.set(self.load_calls.get() + 1);
        *self.last_window.borrow_mut() = Some(window.clone());
        self.failure(Operation::LoadPredictions)?;
        Ok(vec![
            race("14:00:00", 280),
            race("14:00:00", 500),
            race("14:00:00", 500),
        ])
    }

    async fn copy_predict_request(&self, query: &QueryDescriptor) -> Result<String, BackendError> {
        self.failure(Operation::CopyPredictRequest)?;
        Ok(format!("{} distances", query.distances.len()))
    }

    async fn run_test(&self, _query: &TestQuery) -> Result<TestResults, BackendError> {
        self.test_calls.set(self.test_calls.get() + 1);
        self.failure(Operation::RunTest)?;
        Ok(TestResults {
            races: vec![TestRace {
                race_id: 11,
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    async fn load_settings(&self, model: &str) -> Result<ModelSettings, BackendError> {
        Ok(ModelSettings {
            model: model.to_string(),
            ..Default::default()
        })
    }

    async fn save_settings(&self, _settings: &SaveSettings) -> Result<String, BackendError> {
        Ok("saved".into())
    }

    async fn read_instruction_names(&self) -> Result<Vec<String>, BackendError> {
        Ok(vec![])
    }

    async fn add_instruction(&self, _instruction: &Instruction) -> Result<(), BackendError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingClipboard {
    written: RefCell<Vec<String>>,
    deny: bool,
}

impl Clipboard for RecordingClipboard {
    async fn write_text(&self, text: &str) -> Result<(), String> {
        if self.deny {
            return Err("permission denied".into());
        }
        self.written.borrow_mut().push(text.to_string());
        Ok(())
    }
}

fn config() -> QueryConfig {
    QueryConfig::new(TimeZone::UTC, DistanceCatalog::default())
}

fn predict_session() -> RefCell<PredictSession> {
    RefCell::new(PredictSession::new(
        &config(),
        "2024-06-01T14:00:00Z".parse().unwrap(),
    ))
}

#[test]
fn revisiting_a_tab_is_served_from_cache() {
    let backend = CountingBackend::default();
    let session = predict_session();
    block_on(session::load_time_ranges(&session, &backend)).unwrap();

    block_on(session::select_tab(&session, &backend, 0)).unwrap();
    let (first_rows, first_copy) = {
        let s = session.borrow();
        (s.predictions().clone(), s.copy_input().cloned())
    };

    block_on(session::select_tab(&session, &backend, 0)).unwrap();
    let s = session.borrow();
    assert_eq!(backend.load_calls.get(), 1);
    assert_eq!(*s.predictions(), first_rows);
    assert_eq!(s.copy_input().cloned(), first_copy);

    let copy = first_copy.unwrap();
    assert_eq!(copy.time, PredictTime::FixedTime(time(14, 0, 0, 0)));
    assert_eq!(copy.distances, vec![280, 500]);
    assert_eq!(
        backend.last_window.borrow().as_ref().map(|w| w.start_time.clone()),
        Some("14:00:00".to_string())
    );
}

#[test]
fn inverted_distance_range_never_reaches_the_backend() {
    let backend = CountingBackend::default();
    let session = predict_session();
    {
        let mut s = session.borrow_mut();
        s.set_distance_mode(DistanceMode::Range);
        s.set_bounds(1000, 500);
    }
    let result = block_on(session::submit(&session, &backend));
    assert!(matches!(result, Err(SessionError::Invalid(_))));
    assert_eq!(backend.predict_calls.get(), 0);

    let s = session.borrow();
    assert!(s.errors().contains(Field::MinDistance));
    assert!(s.errors().contains(Field::MaxDistance));
}

#[test]
fn missing_fixed_time_only_flags_that_field() {
    let backend = CountingBackend::default();
    let session = predict_session();
    session.borrow_mut().set_fixed_time(None);

    let result = block_on(session::submit(&session, &backend));
    assert!(result.is_err());
    assert_eq!(backend.predict_calls.get(), 0);
    let s = session.borrow();
    assert_eq!(s.errors().fields().collect::<Vec<_>>(), vec![Field::FixedTime]);
}

#[test]
fn submit_shows_results_and_copies_the_same_request() {
    let backend = CountingBackend::default();
    let clipboard = RecordingClipboard::default();
    let session = predict_session();
    {
        let mut s = session.borrow_mut();
        s.set_time_mode(TimeMode::Range);
        s.set_distance_mode(DistanceMode::Explicit);
        s.set_explicit(vec![480, 280, 480]);
    }

    block_on(session::submit(&session, &backend)).unwrap();
    {
        let s = session.borrow();
        assert_eq!(s.view(), View::Results);
        assert_eq!(s.predictions().len(), 2);
        assert_eq!(s.copy_input().unwrap().distances, vec![480, 280]);
    }

    block_on(session::copy_request(&session, &backend, &clipboard)).unwrap();
    assert_eq!(*clipboard.written.borrow(), vec!["2 distances".to_string()]);
    assert_eq!(session.borrow().notice().unwrap().kind, NoticeKind::Copied);
}

#[test]
fn backend_failure_leaves_the_form_in_place() {
    let backend = CountingBackend::default();
    backend.fail.set(true);
    let session = predict_session();

    let result = block_on(session::submit(&session, &backend));
    assert!(matches!(result, Err(SessionError::Backend(_))));
    let s = session.borrow();
    assert_eq!(s.view(), View::Form);
    assert!(!s.is_loading());
    assert_eq!(s.notice().unwrap().kind, NoticeKind::QueryFailed);
}

#[test]
fn denied_clipboard_reports_copy_failure() {
    let backend = CountingBackend::default();
    let clipboard = RecordingClipboard {
        deny: true,
        ..Default::default()
    };
    let session = predict_session();

    let result = block_on(session::copy_request(&session, &backend, &clipboard));
    assert!(matches!(result, Err(SessionError::Export(_))));
    assert_eq!(session.borrow().notice().unwrap().kind, NoticeKind::CopyFailed);
}

#[test]
fn back_test_runs_and_exports() {
    let backend = CountingBackend::default();
    let clipboard = RecordingClipboard::default();
    let session = RefCell::new(BacktestSession::new(
        &config(),
        "2024-06-01T14:00:00Z".parse().unwrap(),
    ));

    assert!(block_on(backtest::run(&session, &backend)).is_err());
    assert_eq!(backend.test_calls.get(), 0);

    session.borrow_mut().set_stake(StakeInputs {
        initial_stake: Some(1.0),
        initial_balance: Some(50.0),
        odds_min: Some(1.2),
        odds_max: Some(8.0),
        favorite_protected: true,
    });
    block_on(backtest::run(&session, &backend)).unwrap();
    assert_eq!(backend.test_calls.get(), 1);
    assert_eq!(session.borrow().view(), View::Results);

    block_on(backtest::copy_export(&session, &clipboard, TestExport::Model)).unwrap();
    assert!(clipboard.written.borrow()[0].contains("\"raceId\": 11"));
}

#[test]
fn prediction_range_past_midnight_is_rejected_before_the_backend() {
    let backend = CountingBackend::default();
    let london = QueryConfig::new(
        TimeZone::get("Europe/London").unwrap(),
        DistanceCatalog::default(),
    );
    let now: jiff::Timestamp = "2024-06-01T22:30:00Z".parse().unwrap();
    let session = RefCell::new(PredictSession::new(&london, now));
    {
        let mut s = session.borrow_mut();
        s.set_time_mode(TimeMode::Range);
        s.set_range_time(Some(now), Some("2024-06-01T23:30:00Z".parse().unwrap()));
    }

    let result = block_on(session::submit(&session, &backend));
    assert!(matches!(result, Err(SessionError::Invalid(_))));
    assert_eq!(backend.predict_calls.get(), 0);
    let s = session.borrow();
    assert!(s.errors().contains(Field::StartTime));
    assert!(s.errors().contains(Field::EndTime));
}

#[test]
fn failed_tab_fetch_is_fetched_again() {
    let backend = CountingBackend::default();
    let session = predict_session();
    block_on(session::load_time_ranges(&session, &backend)).unwrap();

    backend.fail.set(true);
    assert!(block_on(session::select_tab(&session, &backend, 1)).is_err());
    assert_eq!(session.borrow().cached_windows(), 0);

    backend.fail.set(false);
    block_on(session::select_tab(&session, &backend, 1)).unwrap();
    assert_eq!(backend.load_calls.get(), 2);
    assert_eq!(session.borrow().cached_windows(), 1);
}
