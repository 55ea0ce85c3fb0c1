//! Pure Yew view components for the prediction client.
//!
//! Components render from props only; all state lives in the page sessions.

use race_query::distance::{Distance, DistanceMode};
use race_query::models::{Prediction, TestRace, TestResults, TimeRange};
use race_query::session::{Notice, Severity};
use race_query::time_window::TimeMode;
use race_query::validation::{Field, FieldErrors};
use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

/// Inline message for `field`, if it was flagged.
pub fn field_error(errors: &FieldErrors, field: Field) -> Html {
    match errors.get(field) {
        Some(fault) => html! { <div class="input-error">{ fault.to_string() }</div> },
        None => html! {},
    }
}

fn invalid_class(errors: &FieldErrors, field: Field) -> &'static str {
    if errors.contains(field) {
        "invalid"
    } else {
        ""
    }
}

/// Which time input changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInput {
    Fixed,
    Start,
    End,
}

#[derive(Properties, PartialEq)]
pub struct TimeControlProps {
    pub mode: TimeMode,
    /// `datetime-local` values in the domain time zone.
    pub fixed: String,
    pub start: String,
    pub end: String,
    pub errors: FieldErrors,
    pub on_mode: Callback<TimeMode>,
    pub on_input: Callback<(TimeInput, String)>,
}

#[function_component(TimeControl)]
pub fn time_control(props: &TimeControlProps) -> Html {
    let on_mode = props.on_mode.reform(|e: Event| {
        let select: HtmlSelectElement = e.target_unchecked_into();
        if select.value() == "range" {
            TimeMode::Range
        } else {
            TimeMode::Fixed
        }
    });
    let input = |which: TimeInput| {
        props.on_input.reform(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            (which, input.value())
        })
    };
    let errors = &props.errors;

    html! {
        <div class="form-group time-control">
            <label for="time_mode">{ "Time:" }</label>
            <select id="time_mode" onchange={on_mode}>
                <option value="fixed" selected={props.mode == TimeMode::Fixed}>{ "Fixed time" }</option>
                <option value="range" selected={props.mode == TimeMode::Range}>{ "Time range" }</option>
            </select>
            if props.mode == TimeMode::Fixed {
                <input type="datetime-local" step="1"
                    class={invalid_class(errors, Field::FixedTime)}
                    value={props.fixed.clone()}
                    onchange={input(TimeInput::Fixed)} />
                { field_error(errors, Field::FixedTime) }
            } else {
                <div class="time-range">
                    <input type="datetime-local" step="1"
                        class={invalid_class(errors, Field::StartTime)}
                        value={props.start.clone()}
                        onchange={input(TimeInput::Start)} />
                    <span>{ "–" }</span>
                    <input type="datetime-local" step="1"
                        class={invalid_class(errors, Field::EndTime)}
                        value={props.end.clone()}
                        onchange={input(TimeInput::End)} />
                </div>
                { field_error(errors, Field::StartTime) }
                { field_error(errors, Field::EndTime) }
            }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct DistanceControlProps {
    pub catalog: Vec<Distance>,
    pub mode: DistanceMode,
    pub min: Distance,
    pub max: Distance,
    pub explicit: Vec<Distance>,
    /// How many distances the inputs currently resolve to.
    pub resolved: usize,
    pub errors: FieldErrors,
    pub on_mode: Callback<DistanceMode>,
    pub on_bounds: Callback<(Distance, Distance)>,
    pub on_explicit: Callback<Vec<Distance>>,
}

#[function_component(DistanceControl)]
pub fn distance_control(props: &DistanceControlProps) -> Html {
    let on_mode = props.on_mode.reform(|e: Event| {
        let select: HtmlSelectElement = e.target_unchecked_into();
        select.value().parse().unwrap_or(DistanceMode::All)
    });
    let bound = |is_min: bool| {
        let (min, max) = (props.min, props.max);
        props.on_bounds.reform(move |e: Event| {
            let select: HtmlSelectElement = e.target_unchecked_into();
            let picked = select.value().parse().unwrap_or(if is_min { min } else { max });
            if is_min {
                (picked, max)
            } else {
                (min, picked)
            }
        })
    };
    let options = |selected: Distance| {
        props
            .catalog
            .iter()
            .map(|d| html! { <option value={d.to_string()} selected={*d == selected}>{ format!("{}m", d) }</option> })
            .collect::<Html>()
    };
    let errors = &props.errors;

    html! {
        <div class="form-group distance-control">
            <label for="distance_mode">{ "Distances:" }</label>
            <select id="distance_mode" onchange={on_mode}>
                { [DistanceMode::All, DistanceMode::Range, DistanceMode::Explicit].iter().map(|m| html! {
                    <option value={m.as_str()} selected={*m == props.mode}>{ m.to_string() }</option>
                }).collect::<Html>() }
            </select>
            {
                match props.mode {
                    DistanceMode::All => html! {},
                    DistanceMode::Range => html! {
                        <div class="distance-range">
                            <select class={invalid_class(errors, Field::MinDistance)} onchange={bound(true)}>
                                { options(props.min) }
                            </select>
                            <span>{ "–" }</span>
                            <select class={invalid_class(errors, Field::MaxDistance)} onchange={bound(false)}>
                                { options(props.max) }
                            </select>
                            { field_error(errors, Field::MinDistance) }
                            { field_error(errors, Field::MaxDistance) }
                        </div>
                    },
                    DistanceMode::Explicit => html! {
                        <div class={classes!("distance-select", invalid_class(errors, Field::Distances))}>
                            { props.catalog.iter().map(|d| {
                                let d = *d;
                                let checked = props.explicit.contains(&d);
                                let current = props.explicit.clone();
                                let onchange = props.on_explicit.reform(move |_: Event| {
                                    let mut next = current.clone();
                                    if checked {
                                        next.retain(|x| *x != d);
                                    } else {
                                        next.push(d);
                                    }
                                    next
                                });
                                html! {
                                    <label class="distance-option">
                                        <input type="checkbox" {checked} {onchange} />
                                        { format!("{}m", d) }
                                    </label>
                                }
                            }).collect::<Html>() }
                            { field_error(errors, Field::Distances) }
                        </div>
                    },
                }
            }
            <div class="distance-count">{ format!("{} distances selected", props.resolved) }</div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct CacheTabsProps {
    pub tabs: Vec<TimeRange>,
    pub selected: Option<usize>,
    pub disabled: bool,
    pub on_select: Callback<usize>,
}

/// One button per discovered time window.
#[function_component(CacheTabs)]
pub fn cache_tabs(props: &CacheTabsProps) -> Html {
    if props.tabs.is_empty() {
        return html! {};
    }
    html! {
        <div class="time-range-tabs">
            { props.tabs.iter().enumerate().map(|(idx, tab)| {
                let active = props.selected == Some(idx);
                html! {
                    <button
                        class={classes!("tab", active.then_some("active"))}
                        disabled={props.disabled}
                        onclick={props.on_select.reform(move |_| idx)}
                    >
                        { tab.label() }
                    </button>
                }
            }).collect::<Html>() }
        </div>
    }
}

/// Renders one race and its runners.
pub fn render_prediction(prediction: &Prediction, idx: usize, total: usize) -> Html {
    let meta = &prediction.meta;
    html! {
        <div class="prediction">
            <h3>{ format!("{} {} {}m", meta.track, meta.time, meta.distance) }</h3>
            <div class="race-meta">
                { format!("{} · Grade {} · Race {}/{}", meta.date, meta.grade.as_deref().unwrap_or("-"), idx + 1, total) }
            </div>
            <table class="runner-table">
                <thead>
                    <tr>
                        <th>{ "Rank" }</th>
                        <th>{ "Runner" }</th>
                        <th>{ "Score" }</th>
                        <th>{ "%" }</th>
                        <th>{ "Comment" }</th>
                    </tr>
                </thead>
                <tbody>
                    { prediction.predictions.iter().map(|runner| html! {
                        <tr>
                            <td>{ runner.rank }</td>
                            <td>{ runner.name.clone() }</td>
                            <td>{ format!("{:.3}", runner.raw_score) }</td>
                            <td>{ format!("{:.1}", runner.percentage) }</td>
                            <td>{ runner.comment.as_deref().unwrap_or("") }</td>
                        </tr>
                    }).collect::<Html>() }
                </tbody>
            </table>
            if let Some(summary) = &prediction.summary {
                <p class="race-summary">{ summary.clone() }</p>
            }
        </div>
    }
}

/// Headline numbers of a back-test.
pub fn render_test_summary(results: &TestResults) -> Html {
    let meta = &results.meta;
    html! {
        <div class="test-summary">
            <div>{ format!("Races: {} tested of {}", meta.race_count.races_tracked, meta.race_count.total_races) }</div>
            <div>{ format!("Hit rate: {:.1}%", meta.percentage) }</div>
            <div>{ format!("Odds {:.2} – {:.2}", meta.odds_range.low, meta.odds_range.high) }</div>
            <div>{ format!("Stake: {:.2}", meta.initial_stake) }</div>
            <div>{ format!("Balance: {:.2} → {:.2}", meta.balance.initial_balance, meta.balance.final_balance) }</div>
            <div>{ format!(
                "Errors: {} empty, {} unparsable, {} database",
                meta.errors.total_empty_content,
                meta.errors.total_race_parse_error,
                meta.errors.total_mongo_db_error
            ) }</div>
        </div>
    }
}

/// One back-tested race: prediction against real result per runner.
pub fn render_test_race(race: &TestRace, idx: usize, total: usize) -> Html {
    let meta = &race.meta;
    html! {
        <div class="test-race">
            <h3>{ format!("{} {} {}m ({}/{})", meta.track, meta.time, meta.distance, idx + 1, total) }</h3>
            <div class="race-meta">
                { format!("Balance {:.2} · Profit {:+.2}", meta.current_balance, meta.profit) }
            </div>
            <table class="runner-table">
                <thead>
                    <tr>
                        <th>{ "Runner" }</th>
                        <th>{ "Predicted" }</th>
                        <th>{ "Finished" }</th>
                        <th>{ "Odds" }</th>
                    </tr>
                </thead>
                <tbody>
                    { race.dogs.iter().map(|dog| html! {
                        <tr>
                            <td>{ dog.dog_name.clone() }</td>
                            <td>{ dog.model_prediction.rank }</td>
                            <td>{ dog.real_results.rank }</td>
                            <td>{ format!("{:.2}", dog.real_results.betfair_odds) }</td>
                        </tr>
                    }).collect::<Html>() }
                </tbody>
            </table>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct NoticeBarProps {
    pub notice: Option<Notice>,
    pub on_close: Callback<()>,
}

#[function_component(NoticeBar)]
pub fn notice_bar(props: &NoticeBarProps) -> Html {
    let Some(notice) = &props.notice else {
        return html! {};
    };
    let class = match notice.kind.severity() {
        Severity::Success => "notice success",
        Severity::Error => "notice error",
    };
    html! {
        <div {class}>
            <span>{ notice.message.clone() }</span>
            <button class="btn-secondary small" onclick={props.on_close.reform(|_| ())}>{ "×" }</button>
        </div>
    }
}
