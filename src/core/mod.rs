//! Core types and logic for Overload.
//!
//! This module contains the progression pipeline (classifier, policy table,
//! state updater, prescriber), the program aggregate that owns per-exercise
//! progression data, and the engine that ties them together.

pub mod classifier;
pub mod engine;
pub mod outcome;
pub mod policy;
pub mod prescriber;
pub mod program;
pub mod state;
pub mod tag;

pub use classifier::{classify, PrescribedTarget, SessionExerciseData, SetRecord};
pub use engine::{Engine, EngineSettings, Evaluation, SessionEvaluation};
pub use outcome::ProgressionOutcome;
pub use policy::{PolicyRules, ProgressionPolicy, WeightAdjustment};
pub use prescriber::{
    prescribe, ExerciseDefaults, PrescriberSettings, Prescription, PrescriptionDecision,
    ProgressionMode, SetScheme,
};
pub use program::{ExerciseProgressionStatus, Program};
pub use state::{clamp_unit, ExerciseProgressionState, DEFAULT_HISTORY_CAP};
pub use tag::StoredTag;
