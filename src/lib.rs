//! Query layer of the race prediction desktop client.
//!
//! Turns the prediction and back-testing forms into canonical requests for
//! the engine behind the Tauri host, caches the result sets of discovered
//! time windows, and rebuilds the request behind whatever is on screen so it
//! can be copied out.
//!
//! The page logic lives in [`session::PredictSession`] and
//! [`backtest::BacktestSession`]; the Yew binary only renders them and feeds
//! them events.

pub mod backend;
pub mod backtest;
pub mod cache;
pub mod config;
pub mod distance;
pub mod export;
pub mod filter;
pub mod models;
pub mod query;
pub mod reconstruct;
pub mod session;
pub mod tauri;
pub mod time_window;
pub mod utils;
pub mod validation;

pub use backend::{Backend, BackendError, Operation};
pub use backtest::BacktestSession;
pub use cache::{CacheKey, ResultCache};
pub use config::QueryConfig;
pub use distance::{Distance, DistanceCatalog, DistanceMode, DistanceSelection};
pub use export::Clipboard;
pub use filter::{FilterForm, PredictFilter, StakeInputs, TestFilter};
pub use query::{BuildError, QueryBuilder, QueryDescriptor, TestQuery};
pub use session::{PredictSession, SessionError};
pub use tauri::{TauriBackend, WebClipboard};
pub use time_window::{PredictTime, TimeMode, TimeNormalizer, TimeSpec};
pub use validation::{Field, FieldErrors};
