//! CLI commands for Overload.
//!
//! - **Program commands**: create, show, list and toggle programs
//! - **Exercise commands**: enable, disable and override progression per exercise
//! - **Session commands**: evaluate a finished session, browse history

pub mod evaluate;
pub mod exercise;
pub mod history;
pub mod program;

pub use evaluate::EvaluateCommand;
pub use exercise::{ExerciseAction, ExerciseCommand};
pub use history::HistoryCommand;
pub use program::ProgramCommand;
