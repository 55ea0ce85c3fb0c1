//! Shapes exchanged with the prediction engine. Responses are read-only once
//! received.

use crate::distance::Distance;
use serde::{Deserialize, Serialize};

/// A discoverable, already-computed time window, e.g. `14:00` or `14:00`–`16:30`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl TimeRange {
    pub fn label(&self) -> String {
        match &self.end_time {
            Some(end) => format!("{} – {}", self.start_time, end),
            None => self.start_time.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RaceMeta {
    #[serde(default)]
    pub date: String,
    pub time: String,
    pub distance: Distance,
    pub track: String,
    #[serde(default)]
    pub grade: Option<String>,
}

/// One runner's model output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerPrediction {
    pub name: String,
    pub raw_score: f32,
    pub percentage: f32,
    pub rank: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Model output for one race.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Prediction {
    pub meta: RaceMeta,
    pub predictions: Vec<RunnerPrediction>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OddsRange {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceCount {
    pub total_races: usize,
    pub races_tracked: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    pub bad_hit_4_pos: i32,
    pub bad_hit_5_pos: i32,
    pub bad_hit_6_pos: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipInfo {
    pub skipped_races_lt5: i32,
    pub skipped_races_gt6: i32,
    pub skipped_odds_range: i32,
    pub skipped_favorite: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub initial_balance: f64,
    pub final_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestErrors {
    pub total_empty_content: usize,
    pub total_race_parse_error: usize,
    pub total_mongo_db_error: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultsMeta {
    pub race_count: RaceCount,
    pub odds_range: OddsRange,
    pub position_info: PositionInfo,
    pub skip_info: SkipInfo,
    pub balance: Balance,
    pub errors: TestErrors,
    pub initial_stake: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRaceMeta {
    pub date: String,
    pub distance: Distance,
    #[serde(default)]
    pub grade: Option<String>,
    pub time: String,
    pub track: String,
    pub current_balance: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealResult {
    pub rank: u8,
    pub betfair_odds: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDog {
    pub dog_name: String,
    pub model_prediction: RunnerPrediction,
    pub real_results: RealResult,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRace {
    pub race_id: u64,
    pub meta: TestRaceMeta,
    pub dogs: Vec<TestDog>,
    #[serde(default)]
    pub summary: String,
}

/// Aggregate returned by `run_test`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestResults {
    pub meta: TestResultsMeta,
    pub races: Vec<TestRace>,
    /// Raw engine requests, passed through untouched.
    #[serde(default)]
    pub requests: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Generation parameters of one model, as `load_settings` returns them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    pub max_completion_tokens: Option<u32>,
    pub frequency_penalty: Option<f32>,
    pub logprobs: Option<bool>,
    pub presence_penalty: Option<f32>,
    pub reasoning_effort: Option<String>,
    pub seed: Option<f64>,
    pub store: Option<bool>,
    pub temperature: Option<f32>,
    pub max_races: usize,
    pub races_per_request: usize,
    pub instruction_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSettings {
    #[serde(flatten)]
    pub settings: ModelSettings,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub name: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_accepts_backend_json() {
        let raw = r#"{
            "meta": { "date": "2024-06-01", "time": "14:03:00", "distance": 480, "track": "Romford", "grade": null },
            "predictions": [
                { "name": "Swift Bolt", "rawScore": 0.82, "percentage": 41.0, "rank": 1, "comment": null }
            ],
            "summary": "Trap 1 fancied"
        }"#;
        let prediction: Prediction = serde_json::from_str(raw).unwrap();
        assert_eq!(prediction.meta.distance, 480);
        assert_eq!(prediction.predictions[0].rank, 1);
        assert_eq!(prediction.summary.as_deref(), Some("Trap 1 fancied"));
    }

    #[test]
    fn time_range_end_is_optional() {
        let tab: TimeRange = serde_json::from_str(r#"{ "startTime": "14:00" }"#).unwrap();
        assert_eq!(tab.end_time, None);
        assert_eq!(tab.label(), "14:00");

        let tab: TimeRange =
            serde_json::from_str(r#"{ "startTime": "14:00", "endTime": "16:30" }"#).unwrap();
        assert_eq!(tab.label(), "14:00 – 16:30");
    }

    #[test]
    fn test_meta_uses_backend_field_names() {
        let json = serde_json::to_value(PositionInfo {
            bad_hit_4_pos: 1,
            bad_hit_5_pos: 2,
            bad_hit_6_pos: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "badHit4Pos": 1, "badHit5Pos": 2, "badHit6Pos": 3 })
        );
    }

    #[test]
    fn save_settings_flattens_model_settings() {
        let json = serde_json::to_value(SaveSettings {
            settings: ModelSettings {
                model: "o4-mini".into(),
                max_races: 50,
                races_per_request: 1,
                ..Default::default()
            },
            selected: true,
        })
        .unwrap();
        assert_eq!(json["model"], "o4-mini");
        assert_eq!(json["selected"], true);
        assert_eq!(json["max_races"], 50);
    }
}
