//! Progression history for Overload.
//!
//! An append-only JSONL log of what the engine decided and how users
//! configured progression, kept next to the program store.

pub mod log;

pub use log::{HistoryLogger, ProgressionEvent, ProgressionEventType, HISTORY_SCHEMA_VERSION};
