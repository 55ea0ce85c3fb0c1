//! Text exports of result sets for the copy actions.

use crate::distance::Distance;
use crate::models::{Prediction, TestResults};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Destination of copy actions.
#[allow(async_fn_in_trait)]
pub trait Clipboard {
    async fn write_text(&self, text: &str) -> Result<(), String>;
}

#[derive(Debug)]
pub enum ExportError {
    Json(serde_json::Error),
    Csv(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Json(err) => write!(f, "JSON encoding failed: {}", err),
            ExportError::Csv(msg) => write!(f, "CSV encoding failed: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Csv(err.to_string())
    }
}

pub fn predictions_json(predictions: &[Prediction]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(predictions)?)
}

#[derive(Serialize)]
struct RunnerRow<'a> {
    date: &'a str,
    time: &'a str,
    distance: Distance,
    track: &'a str,
    grade: &'a str,
    rank: u8,
    name: &'a str,
    raw_score: f32,
    percentage: f32,
    comment: &'a str,
}

/// One CSV row per runner, races in result order.
pub fn predictions_csv(predictions: &[Prediction]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for race in predictions {
        let meta = &race.meta;
        for runner in &race.predictions {
            writer.serialize(RunnerRow {
                date: &meta.date,
                time: &meta.time,
                distance: meta.distance,
                track: &meta.track,
                grade: meta.grade.as_deref().unwrap_or(""),
                rank: runner.rank,
                name: &runner.name,
                raw_score: runner.raw_score,
                percentage: runner.percentage,
                comment: runner.comment.as_deref().unwrap_or(""),
            })?;
        }
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Csv(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::Csv(err.to_string()))
}

/// Which half of each back-tested runner to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceExport {
    /// What the model predicted.
    Model,
    /// What actually happened.
    Real,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Races of a back-test, each runner carrying either its prediction or its
/// real result next to its name.
pub fn races_json(results: &TestResults, export: RaceExport) -> Result<String, ExportError> {
    let mut races = Vec::with_capacity(results.races.len());
    for race in &results.races {
        let mut row = Map::new();
        row.insert("raceId".into(), Value::from(race.race_id));
        row.extend(object(serde_json::to_value(&race.meta)?));

        let mut dogs = Vec::with_capacity(race.dogs.len());
        for dog in &race.dogs {
            let mut entry = Map::new();
            entry.insert("dogName".into(), Value::from(dog.dog_name.clone()));
            let detail = match export {
                RaceExport::Model => serde_json::to_value(&dog.model_prediction)?,
                RaceExport::Real => serde_json::to_value(&dog.real_results)?,
            };
            entry.extend(object(detail));
            dogs.push(Value::Object(entry));
        }
        row.insert("dogs".into(), Value::Array(dogs));
        races.push(Value::Object(row));
    }
    Ok(serde_json::to_string_pretty(&races)?)
}

/// The raw requests the engine sent while back-testing.
pub fn requests_json(results: &TestResults) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&results.requests)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RaceMeta, RealResult, RunnerPrediction, TestDog, TestRace, TestRaceMeta};
    use serde_json::json;

    fn runner(name: &str, rank: u8) -> RunnerPrediction {
        RunnerPrediction {
            name: name.into(),
            raw_score: 0.5,
            percentage: 25.0,
            rank,
            comment: None,
        }
    }

    fn prediction() -> Prediction {
        Prediction {
            meta: RaceMeta {
                date: "2024-06-01".into(),
                time: "14:00:00".into(),
                distance: 480,
                track: "Romford".into(),
                grade: Some("A3".into()),
            },
            predictions: vec![runner("Swift Blue", 1), runner("Late Call", 2)],
            summary: None,
        }
    }

    fn results() -> TestResults {
        TestResults {
            races: vec![TestRace {
                race_id: 7,
                meta: TestRaceMeta {
                    distance: 480,
                    track: "Romford".into(),
                    ..Default::default()
                },
                dogs: vec![TestDog {
                    dog_name: "Swift Blue".into(),
                    model_prediction: runner("Swift Blue", 1),
                    real_results: RealResult {
                        rank: 3,
                        betfair_odds: 4.5,
                    },
                }],
                summary: String::new(),
            }],
            requests: vec![object(json!({ "race": 7 }))],
            ..Default::default()
        }
    }

    #[test]
    fn csv_has_a_row_per_runner() {
        let text = predictions_csv(&[prediction()]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,time,distance,track,grade,rank,name"));
        assert!(lines[1].contains("Romford,A3,1,Swift Blue"));
        assert!(lines[2].contains("2,Late Call"));
    }

    #[test]
    fn json_export_is_the_result_list() {
        let text = predictions_json(&[prediction()]).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["meta"]["track"], "Romford");
    }

    #[test]
    fn race_exports_pick_model_or_real_half() {
        let model: Value = serde_json::from_str(&races_json(&results(), RaceExport::Model).unwrap()).unwrap();
        let dog = &model[0]["dogs"][0];
        assert_eq!(model[0]["raceId"], 7);
        assert_eq!(dog["dogName"], "Swift Blue");
        assert_eq!(dog["rank"], 1);
        assert!(dog.get("betfairOdds").is_none());

        let real: Value = serde_json::from_str(&races_json(&results(), RaceExport::Real).unwrap()).unwrap();
        assert_eq!(real[0]["dogs"][0]["rank"], 3);
        assert_eq!(real[0]["dogs"][0]["betfairOdds"], 4.5);
    }

    #[test]
    fn requests_are_exported_verbatim() {
        let value: Value = serde_json::from_str(&requests_json(&results()).unwrap()).unwrap();
        assert_eq!(value, json!([{ "race": 7 }]));
    }
}
