//! JavaScript interop with the Tauri host.
//! Provides a [`Backend`] over the host's `invoke` bridge and a [`Clipboard`]
//! over the webview's clipboard.

use crate::backend::{
    Backend, BackendError, InputArgs, LoadPredictionsInput, LoadSettingsInput, Operation,
    window_with_seconds,
};
use crate::export::Clipboard;
use crate::models::{Instruction, ModelSettings, Prediction, SaveSettings, TestResults, TimeRange};
use crate::query::{PredictRequest, QueryDescriptor, TestQuery};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["window", "__TAURI__", "core"], js_name = invoke, catch)]
    async fn tauri_invoke(cmd: &str, args: JsValue) -> Result<JsValue, JsValue>;
}

#[derive(Serialize)]
struct NoArgs {}

/// Readable text for whatever the host rejected with.
fn js_error_message(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| {
        js_sys::JSON::stringify(err)
            .map(String::from)
            .unwrap_or_else(|_| format!("{:?}", err))
    })
}

async fn call<A, R>(operation: Operation, args: &A) -> Result<R, BackendError>
where
    A: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    let args = args
        .serialize(&serializer)
        .map_err(|e| BackendError::encode(operation, e.to_string()))?;

    debug!("Invoking {}", operation);
    let response = tauri_invoke(operation.command(), args)
        .await
        .map_err(|e| BackendError::invoke(operation, js_error_message(&e)))?;

    serde_wasm_bindgen::from_value(response)
        .map_err(|e| BackendError::decode(operation, e.to_string()))
}

/// The engine as exposed by the desktop shell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TauriBackend;

impl Backend for TauriBackend {
    async fn load_time_ranges(&self) -> Result<Vec<TimeRange>, BackendError> {
        call(Operation::LoadTimeRanges, &NoArgs {}).await
    }

    async fn run_predict(&self, query: &QueryDescriptor) -> Result<Vec<Prediction>, BackendError> {
        call(Operation::RunPredict, &PredictRequest { input: query }).await
    }

    async fn load_predictions(&self, window: &TimeRange) -> Result<Vec<Prediction>, BackendError> {
        let args = InputArgs {
            input: LoadPredictionsInput {
                time_range: window_with_seconds(window),
            },
        };
        call(Operation::LoadPredictions, &args).await
    }

    async fn copy_predict_request(&self, query: &QueryDescriptor) -> Result<String, BackendError> {
        call(Operation::CopyPredictRequest, &PredictRequest { input: query }).await
    }

    async fn run_test(&self, query: &TestQuery) -> Result<TestResults, BackendError> {
        call(Operation::RunTest, query).await
    }

    async fn load_settings(&self, model: &str) -> Result<ModelSettings, BackendError> {
        let args = InputArgs {
            input: LoadSettingsInput { model },
        };
        call(Operation::LoadSettings, &args).await
    }

    async fn save_settings(&self, settings: &SaveSettings) -> Result<String, BackendError> {
        call(Operation::SaveSettings, &InputArgs { input: settings }).await
    }

    async fn read_instruction_names(&self) -> Result<Vec<String>, BackendError> {
        call(Operation::ReadInstructionNames, &NoArgs {}).await
    }

    async fn add_instruction(&self, instruction: &Instruction) -> Result<(), BackendError> {
        let reply: String =
            call(Operation::AddInstruction, &InputArgs { input: instruction }).await?;
        info!("{}", reply);
        Ok(())
    }
}

/// The webview's asynchronous clipboard.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WebClipboard;

impl Clipboard for WebClipboard {
    async fn write_text(&self, text: &str) -> Result<(), String> {
        let promise = gloo_utils::window().navigator().clipboard().write_text(text);
        wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| js_error_message(&e))
    }
}
