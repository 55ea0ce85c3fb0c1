//! Main module of the race prediction client using Yew.
//! Wires the page sessions to components and spawns the backend calls.

use jiff::Timestamp;
use log::{debug, error, warn};
use race_query::backtest::{self, BacktestSession, TestExport};
use race_query::config::QueryConfig;
use race_query::distance::{Distance, DistanceFilter, DistanceMode};
use race_query::filter::FilterForm;
use race_query::session::{self as predict, PredictSession, ResultsFormat, SessionError, View};
use race_query::time_window::{TimeFilter, TimeMode, TimeNormalizer};
use race_query::utils::{format_datetime_local, parse_datetime_local, parse_optional_number};
use race_query::validation::{Field, FieldErrors};
use race_query::{TauriBackend, WebClipboard};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

mod components;
mod hooks;

use components::{
    field_error, render_prediction, render_test_race, render_test_summary, CacheTabs,
    DistanceControl, NoticeBar, TimeControl, TimeInput,
};
use hooks::{use_notice_expiry, use_session, use_validated_input, SessionHandle};

// ──────────────────────────────────────────────────────────────────────────────
// Helper functions

fn load_config() -> QueryConfig {
    QueryConfig::domain().unwrap_or_else(|err| {
        error!("{}; falling back to UTC", err);
        QueryConfig::default()
    })
}

/// `datetime-local` text for an instant, in the domain time zone.
fn input_value(normalizer: &TimeNormalizer, at: Option<Timestamp>) -> String {
    at.map(|ts| format_datetime_local(normalizer.wall_clock(ts)))
        .unwrap_or_default()
}

/// Instant named by `datetime-local` text. Unusable text clears the input.
fn parse_input(normalizer: &TimeNormalizer, text: &str) -> Option<Timestamp> {
    let wall_clock = parse_datetime_local(text).ok()?;
    normalizer
        .from_wall_clock(wall_clock)
        .map_err(|err| warn!("{}", err))
        .ok()
}

fn report(action: &str, result: Result<(), SessionError>) {
    match result {
        Ok(()) | Err(SessionError::Busy) => {}
        Err(err) => debug!("{} did not complete: {}", action, err),
    }
}

/// Run an async driver against the session and re-render when it is done.
fn spawn_driver<S, F, Fut>(session: &SessionHandle<S>, action: &'static str, drive: F)
where
    S: 'static,
    F: FnOnce(Rc<RefCell<S>>) -> Fut + 'static,
    Fut: Future<Output = Result<(), SessionError>> + 'static,
{
    let session = session.clone();
    spawn_local(async move {
        let result = drive(session.cell()).await;
        report(action, result);
        session.refresh();
    });
}

/// What the shared filter controls need from a page session.
trait FilterPage: FilterForm + 'static {
    fn time(&self) -> &TimeFilter;
    fn distance(&self) -> &DistanceFilter;
    fn resolved(&self) -> &[Distance];
    fn field_errors(&self) -> &FieldErrors;
    fn time_normalizer(&self) -> &TimeNormalizer;
    fn catalog(&self) -> Vec<Distance>;
}

impl FilterPage for PredictSession {
    fn time(&self) -> &TimeFilter {
        &self.filter().time
    }
    fn distance(&self) -> &DistanceFilter {
        &self.filter().distance
    }
    fn resolved(&self) -> &[Distance] {
        self.distances()
    }
    fn field_errors(&self) -> &FieldErrors {
        self.errors()
    }
    fn time_normalizer(&self) -> &TimeNormalizer {
        self.normalizer()
    }
    fn catalog(&self) -> Vec<Distance> {
        self.builder().catalog().as_slice().to_vec()
    }
}

impl FilterPage for BacktestSession {
    fn time(&self) -> &TimeFilter {
        &self.filter().time
    }
    fn distance(&self) -> &DistanceFilter {
        &self.filter().distance
    }
    fn resolved(&self) -> &[Distance] {
        self.distances()
    }
    fn field_errors(&self) -> &FieldErrors {
        self.errors()
    }
    fn time_normalizer(&self) -> &TimeNormalizer {
        self.normalizer()
    }
    fn catalog(&self) -> Vec<Distance> {
        self.builder().catalog().as_slice().to_vec()
    }
}

fn apply_time_input<S: FilterForm>(s: &mut S, which: TimeInput, at: Option<Timestamp>) {
    match which {
        TimeInput::Fixed => s.set_fixed_time(at),
        TimeInput::Start => {
            let end = s.time_filter_mut().end;
            s.set_range_time(at, end);
        }
        TimeInput::End => {
            let start = s.time_filter_mut().start;
            s.set_range_time(start, at);
        }
    }
}

/// Time and distance controls bound to `session`.
fn filter_controls<S: FilterPage>(session: &SessionHandle<S>) -> Html {
    let s = session.borrow();
    let normalizer = s.time_normalizer().clone();
    let time = s.time();
    let distance = s.distance();

    let on_time_mode = {
        let session = session.clone();
        Callback::from(move |mode: TimeMode| session.update(|s| s.set_time_mode(mode)))
    };
    let on_time_input = {
        let session = session.clone();
        let normalizer = normalizer.clone();
        Callback::from(move |(which, text): (TimeInput, String)| {
            let at = parse_input(&normalizer, &text);
            session.update(|s| apply_time_input(s, which, at));
        })
    };
    let on_distance_mode = {
        let session = session.clone();
        Callback::from(move |mode: DistanceMode| session.update(|s| s.set_distance_mode(mode)))
    };
    let on_bounds = {
        let session = session.clone();
        Callback::from(move |(min, max): (Distance, Distance)| {
            session.update(|s| s.set_bounds(min, max))
        })
    };
    let on_explicit = {
        let session = session.clone();
        Callback::from(move |set: Vec<Distance>| session.update(|s| s.set_explicit(set)))
    };

    html! {
        <>
            <TimeControl
                mode={time.mode}
                fixed={input_value(&normalizer, time.fixed)}
                start={input_value(&normalizer, time.start)}
                end={input_value(&normalizer, time.end)}
                errors={s.field_errors().clone()}
                on_mode={on_time_mode}
                on_input={on_time_input}
            />
            <DistanceControl
                catalog={s.catalog()}
                mode={distance.mode}
                min={distance.min}
                max={distance.max}
                explicit={distance.explicit.clone()}
                resolved={s.resolved().len()}
                errors={s.field_errors().clone()}
                on_mode={on_distance_mode}
                on_bounds={on_bounds}
                on_explicit={on_explicit}
            />
        </>
    }
}

/// Arrow keys page through results, Escape goes back to the form.
fn results_keys(advance: Callback<()>, retreat: Callback<()>, back: Callback<()>) -> Callback<KeyboardEvent> {
    Callback::from(move |e: KeyboardEvent| match e.key().as_str() {
        "ArrowRight" | "ArrowDown" => {
            e.prevent_default();
            advance.emit(());
        }
        "ArrowLeft" | "ArrowUp" => {
            e.prevent_default();
            retreat.emit(());
        }
        "Escape" => back.emit(()),
        _ => {}
    })
}

// ──────────────────────────────────────────────────────────────────────────────

#[function_component(PredictPage)]
fn predict_page() -> Html {
    let session = use_session(|| PredictSession::new(&load_config(), Timestamp::now()));

    // Discover the cached time windows on mount
    {
        let session = session.clone();
        use_effect_with((), move |_| {
            spawn_driver(&session, "load_time_ranges", |cell| async move {
                predict::load_time_ranges(&cell, &TauriBackend).await
            });
        });
    }

    let notice = session.borrow().notice().cloned();
    let expire = {
        let session = session.clone();
        Callback::from(move |id: u64| session.update(|s| s.expire_notice(id)))
    };
    use_notice_expiry(notice.clone(), expire);

    let on_submit = {
        let session = session.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            spawn_driver(&session, "submit", |cell| async move {
                predict::submit(&cell, &TauriBackend).await
            });
            session.refresh();
        })
    };
    let on_select_tab = {
        let session = session.clone();
        Callback::from(move |idx: usize| {
            spawn_driver(&session, "select_tab", move |cell| async move {
                predict::select_tab(&cell, &TauriBackend, idx).await
            });
            session.refresh();
        })
    };
    let on_copy_request = {
        let session = session.clone();
        Callback::from(move |_: MouseEvent| {
            spawn_driver(&session, "copy_request", |cell| async move {
                predict::copy_request(&cell, &TauriBackend, &WebClipboard).await
            })
        })
    };
    let copy_results = |format: ResultsFormat| {
        let session = session.clone();
        Callback::from(move |_: MouseEvent| {
            spawn_driver(&session, "copy_results", move |cell| async move {
                predict::copy_results(&cell, &WebClipboard, format).await
            })
        })
    };
    let advance = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.advance()))
    };
    let retreat = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.retreat()))
    };
    let back = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.back()))
    };
    let on_close = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.dismiss_notice()))
    };

    let s = session.borrow();
    let loading = s.is_loading();

    html! {
        <div class="page predict-page">
            <NoticeBar {notice} {on_close} />
            <CacheTabs
                tabs={s.time_ranges().to_vec()}
                selected={s.selected_tab()}
                disabled={loading}
                on_select={on_select_tab}
            />
            if s.view() == View::Form {
                <form class="filter-form" onsubmit={on_submit}>
                    { filter_controls(&session) }
                    <div class="form-actions">
                        <button type="submit" class="btn-primary" disabled={loading}>
                            { if loading { "Predicting…" } else { "Predict" } }
                        </button>
                        <button type="button" class="btn-secondary"
                            disabled={s.export_query().is_none()}
                            onclick={on_copy_request.clone()}>
                            { "Copy request" }
                        </button>
                    </div>
                </form>
            } else {
                <div class="results-area" tabindex="0"
                    onkeydown={results_keys(advance.clone(), retreat.clone(), back.clone())}>
                    <div class="results-actions">
                        <button class="btn-secondary" onclick={back.reform(|_| ())}>{ "Back" }</button>
                        <button class="btn-secondary" disabled={s.copy_input().is_none()}
                            onclick={on_copy_request}>{ "Copy request" }</button>
                        <button class="btn-secondary" onclick={copy_results(ResultsFormat::Json)}>{ "Copy JSON" }</button>
                        <button class="btn-secondary" onclick={copy_results(ResultsFormat::Csv)}>{ "Copy CSV" }</button>
                    </div>
                    if let Some(prediction) = s.active_prediction() {
                        <div class="stepper">
                            <button onclick={retreat.reform(|_| ())} disabled={s.active_index() == 0}>{ "‹" }</button>
                            <button onclick={advance.reform(|_| ())}
                                disabled={s.active_index() + 1 >= s.predictions().len()}>{ "›" }</button>
                        </div>
                        { render_prediction(prediction, s.active_index(), s.predictions().len()) }
                    } else {
                        <div class="no-results-message">
                            <p>{ "No races matched the filter." }</p>
                        </div>
                    }
                </div>
            }
        </div>
    }
}

#[function_component(TestPage)]
fn test_page() -> Html {
    let session = use_session(|| BacktestSession::new(&load_config(), Timestamp::now()));

    let notice = session.borrow().notice().cloned();
    let expire = {
        let session = session.clone();
        Callback::from(move |id: u64| session.update(|s| s.expire_notice(id)))
    };
    use_notice_expiry(notice.clone(), expire);

    let stake = {
        let session = session.clone();
        use_validated_input(
            String::new(),
            Rc::new(|text: &str| parse_optional_number(text, "Stake")),
            Callback::from(move |v| session.update(|s| s.set_initial_stake(v))),
        )
    };
    let balance = {
        let session = session.clone();
        use_validated_input(
            String::new(),
            Rc::new(|text: &str| parse_optional_number(text, "Balance")),
            Callback::from(move |v| session.update(|s| s.set_initial_balance(v))),
        )
    };
    let odds_min = {
        let session = session.clone();
        use_validated_input(
            String::new(),
            Rc::new(|text: &str| parse_optional_number(text, "Minimum odds")),
            Callback::from(move |v| {
                session.update(|s| {
                    let max = s.filter().stake.odds_max;
                    s.set_odds_range(v, max);
                })
            }),
        )
    };
    let odds_max = {
        let session = session.clone();
        use_validated_input(
            String::new(),
            Rc::new(|text: &str| parse_optional_number(text, "Maximum odds")),
            Callback::from(move |v| {
                session.update(|s| {
                    let min = s.filter().stake.odds_min;
                    s.set_odds_range(min, v);
                })
            }),
        )
    };

    let on_favorite = {
        let session = session.clone();
        Callback::from(move |e: Event| {
            let input: web_sys::HtmlInputElement = e.target_unchecked_into();
            let checked = input.checked();
            session.update(|s| s.set_favorite_protected(checked));
        })
    };
    let on_run = {
        let session = session.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            spawn_driver(&session, "run_test", |cell| async move {
                backtest::run(&cell, &TauriBackend).await
            });
            session.refresh();
        })
    };
    let copy = |export: TestExport| {
        let session = session.clone();
        Callback::from(move |_: MouseEvent| {
            spawn_driver(&session, "copy_export", move |cell| async move {
                backtest::copy_export(&cell, &WebClipboard, export).await
            })
        })
    };
    let advance = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.advance()))
    };
    let retreat = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.retreat()))
    };
    let back = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.back()))
    };
    let on_close = {
        let session = session.clone();
        Callback::from(move |_: ()| session.update(|s| s.dismiss_notice()))
    };

    let s = session.borrow();
    let loading = s.is_loading();
    let errors = s.errors();
    let number_input = |id: &'static str, label: &'static str, field: Field, input: &hooks::ValidatedInput| {
        html! {
            <div class="form-group">
                <label for={id}>{ label }</label>
                <input type="text" inputmode="decimal" id={id}
                    value={input.text.clone()}
                    class={if input.error.is_some() || errors.contains(field) { "invalid" } else { "" }}
                    oninput={input.on_text_input.clone()}
                    onchange={input.on_commit.reform(|_| ())}
                />
                if let Some(err) = &input.error {
                    <div class="input-error">{ err.clone() }</div>
                } else {
                    { field_error(errors, field) }
                }
            </div>
        }
    };

    html! {
        <div class="page test-page">
            <NoticeBar {notice} {on_close} />
            if s.view() == View::Form {
                <form class="filter-form" onsubmit={on_run}>
                    { filter_controls(&session) }
                    { number_input("initial_stake", "Initial stake:", Field::Stake, &stake) }
                    { number_input("initial_balance", "Initial balance:", Field::Balance, &balance) }
                    { number_input("odds_min", "Minimum odds:", Field::OddsMin, &odds_min) }
                    { number_input("odds_max", "Maximum odds:", Field::OddsMax, &odds_max) }
                    <div class="form-group">
                        <label>
                            <input type="checkbox"
                                checked={s.filter().stake.favorite_protected}
                                onchange={on_favorite} />
                            { "Protect favourite" }
                        </label>
                    </div>
                    <div class="form-actions">
                        <button type="submit" class="btn-primary" disabled={loading}>
                            { if loading { "Testing…" } else { "Run test" } }
                        </button>
                    </div>
                </form>
            } else {
                <div class="results-area" tabindex="0"
                    onkeydown={results_keys(advance.clone(), retreat.clone(), back.clone())}>
                    <div class="results-actions">
                        <button class="btn-secondary" onclick={back.reform(|_| ())}>{ "Back" }</button>
                        <button class="btn-secondary" onclick={copy(TestExport::Model)}>{ "Copy predictions" }</button>
                        <button class="btn-secondary" onclick={copy(TestExport::Real)}>{ "Copy real results" }</button>
                        <button class="btn-secondary" onclick={copy(TestExport::Requests)}>{ "Copy requests" }</button>
                    </div>
                    if let Some(results) = s.results() {
                        { render_test_summary(results) }
                        if let Some(race) = s.active_race() {
                            <div class="stepper">
                                <button onclick={retreat.reform(|_| ())} disabled={s.active_index() == 0}>{ "‹" }</button>
                                <button onclick={advance.reform(|_| ())}
                                    disabled={s.active_index() + 1 >= results.races.len()}>{ "›" }</button>
                            </div>
                            { render_test_race(race, s.active_index(), results.races.len()) }
                        }
                    }
                </div>
            }
        </div>
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Predict,
    Test,
}

/// App shell switching between the prediction and back-testing pages.
#[function_component]
pub fn App() -> Html {
    let page = use_state(|| Page::Predict);
    let show = |target: Page| {
        let page = page.clone();
        Callback::from(move |_: MouseEvent| page.set(target))
    };

    html! {
        <div class="container">
            <nav class="page-nav">
                <button class={classes!("tab", (*page == Page::Predict).then_some("active"))}
                    onclick={show(Page::Predict)}>{ "Predict" }</button>
                <button class={classes!("tab", (*page == Page::Test).then_some("active"))}
                    onclick={show(Page::Test)}>{ "Back-test" }</button>
            </nav>
            {
                match *page {
                    Page::Predict => html! { <PredictPage /> },
                    Page::Test => html! { <TestPage /> },
                }
            }
        </div>
    }
}

/// Entry point: initializes Yew renderer for the App component.
fn main() {
    console_error_panic_hook::set_once();
    yew::Renderer::<App>::new().render();
}
