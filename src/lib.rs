//! Overload - adaptive progressive overload for resistance training
//!
//! Overload tracks per-exercise progression state inside a training program.
//! After each session it classifies how an exercise went, updates streaks and
//! confidence under the exercise's policy, and prescribes the load and reps
//! for the next session.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod history;
pub mod storage;
pub mod util;

pub use config::Config;
pub use core::{
    Engine, EngineSettings, Evaluation, ExerciseDefaults, ExerciseProgressionState, Prescription,
    Program, ProgressionOutcome, ProgressionPolicy, SessionExerciseData, SetRecord,
};
pub use error::{OverloadError, Result};
pub use history::{HistoryLogger, ProgressionEvent, ProgressionEventType};
pub use storage::{FileProgramStore, MemoryProgramStore, ProgramStore};

// CLI commands
pub use cli::{EvaluateCommand, ExerciseCommand, HistoryCommand, ProgramCommand};
