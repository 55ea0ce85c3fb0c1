//! The remote-procedure boundary to the prediction/back-testing engine.
//!
//! Each named operation is one method of [`Backend`]. Implementations own the
//! transport; this crate only cares about the input/output shapes.

use crate::models::{Instruction, ModelSettings, Prediction, SaveSettings, TestResults, TimeRange};
use crate::query::{QueryDescriptor, TestQuery};
use crate::utils::parse_tab_time;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    LoadTimeRanges,
    RunPredict,
    LoadPredictions,
    CopyPredictRequest,
    RunTest,
    LoadSettings,
    SaveSettings,
    ReadInstructionNames,
    AddInstruction,
}

impl Operation {
    /// Command name as registered with the host.
    pub fn command(&self) -> &'static str {
        match self {
            Operation::LoadTimeRanges => "load_time_ranges",
            Operation::RunPredict => "run_predict",
            Operation::LoadPredictions => "load_predictions",
            Operation::CopyPredictRequest => "copy_predict_request",
            Operation::RunTest => "run_test",
            Operation::LoadSettings => "load_settings",
            Operation::SaveSettings => "save_settings",
            Operation::ReadInstructionNames => "read_instruction_names",
            Operation::AddInstruction => "add_instruction",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Arguments could not be converted for the transport.
    Encode(String),
    /// The operation itself failed.
    Invoke(String),
    /// The response did not have the expected shape.
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub operation: Operation,
    pub kind: BackendErrorKind,
}

impl BackendError {
    pub fn invoke(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: BackendErrorKind::Invoke(message.into()),
        }
    }

    pub fn encode(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: BackendErrorKind::Encode(message.into()),
        }
    }

    pub fn decode(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: BackendErrorKind::Decode(message.into()),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BackendErrorKind::Encode(msg) => {
                write!(f, "{}: could not encode arguments: {}", self.operation, msg)
            }
            BackendErrorKind::Invoke(msg) => write!(f, "{} failed: {}", self.operation, msg),
            BackendErrorKind::Decode(msg) => {
                write!(f, "{}: unexpected response: {}", self.operation, msg)
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Named operations of the prediction engine.
///
/// Calls are awaited one at a time by the action that issued them; there are
/// no retries and no cancellation.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn load_time_ranges(&self) -> Result<Vec<TimeRange>, BackendError>;

    async fn run_predict(&self, query: &QueryDescriptor) -> Result<Vec<Prediction>, BackendError>;

    async fn load_predictions(&self, window: &TimeRange) -> Result<Vec<Prediction>, BackendError>;

    /// Serialized text of the races the query selects.
    async fn copy_predict_request(&self, query: &QueryDescriptor) -> Result<String, BackendError>;

    async fn run_test(&self, query: &TestQuery) -> Result<TestResults, BackendError>;

    async fn load_settings(&self, model: &str) -> Result<ModelSettings, BackendError>;

    async fn save_settings(&self, settings: &SaveSettings) -> Result<String, BackendError>;

    async fn read_instruction_names(&self) -> Result<Vec<String>, BackendError>;

    async fn add_instruction(&self, instruction: &Instruction) -> Result<(), BackendError>;
}

/// `{ "input": … }`, the envelope most commands take their argument in.
#[derive(Debug, Serialize)]
pub struct InputArgs<T> {
    pub input: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPredictionsInput {
    pub time_range: TimeRange,
}

#[derive(Debug, Serialize)]
pub struct LoadSettingsInput<'a> {
    pub model: &'a str,
}

/// Tab times are listed as `HH:MM`; the engine matches stored predictions
/// on `HH:MM:SS`.
pub fn window_with_seconds(tab: &TimeRange) -> TimeRange {
    let widen = |value: &str| match parse_tab_time(value) {
        Ok(time) => time.strftime("%H:%M:%S").to_string(),
        Err(_) => value.to_string(),
    };
    TimeRange {
        start_time: widen(&tab.start_time),
        end_time: tab.end_time.as_deref().map(widen),
    }
}
