//! Progression event types and JSONL log writer.
//!
//! Events are stored in an append-only JSONL file (`~/.overload/history.log`).
//! Lines that fail to parse are skipped on read so a single corrupt write
//! never hides the rest of the history.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Evaluation, PrescriptionDecision, ProgressionOutcome, ProgressionPolicy};
use crate::error::{OverloadError, Result};
use crate::util::read_to_string_limited;

/// Schema version for progression events.
///
/// Increment when the event schema changes in a breaking way.
pub const HISTORY_SCHEMA_VERSION: u8 = 1;

/// A progression event that is written to the JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressionEvent {
    /// Schema version for forward compatibility.
    pub v: u8,
    /// Timestamp of the event.
    pub ts: DateTime<Utc>,
    /// Program the event belongs to.
    pub program_id: String,
    /// The event type and its data.
    #[serde(flatten)]
    pub data: ProgressionEventType,
}

impl ProgressionEvent {
    /// Create a new event with the current timestamp.
    pub fn new(program_id: impl Into<String>, data: ProgressionEventType) -> Self {
        Self::with_timestamp(program_id, data, Utc::now())
    }

    /// Create an event with a specific timestamp.
    pub fn with_timestamp(
        program_id: impl Into<String>,
        data: ProgressionEventType,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            v: HISTORY_SCHEMA_VERSION,
            ts,
            program_id: program_id.into(),
            data,
        }
    }

    /// Build the event describing an engine evaluation.
    ///
    /// Returns `None` for evaluations that changed nothing.
    pub fn from_evaluation(
        program_id: impl Into<String>,
        exercise_id: &str,
        evaluation: &Evaluation,
        ts: DateTime<Utc>,
    ) -> Option<Self> {
        let data = match evaluation {
            Evaluation::Inactive | Evaluation::NoOutcome => return None,
            Evaluation::Seeded { prescription, .. } => ProgressionEventType::Seeded {
                exercise_id: exercise_id.to_string(),
                weight: prescription.weight,
                reps: prescription.reps,
            },
            Evaluation::Evaluated(eval) => ProgressionEventType::Evaluated {
                exercise_id: exercise_id.to_string(),
                outcome: eval.outcome,
                confidence: eval.state.confidence,
                weight: eval.prescription.weight,
                reps: eval.prescription.reps,
                decision: eval.prescription.decision,
            },
        };
        Some(Self::with_timestamp(program_id, data, ts))
    }
}

/// The type of progression event and its associated data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressionEventType {
    /// A session was classified and a new target prescribed.
    Evaluated {
        exercise_id: String,
        outcome: ProgressionOutcome,
        /// Confidence after the update.
        confidence: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reps: Option<u32>,
        decision: PrescriptionDecision,
    },

    /// The first target was seeded from the exercise defaults.
    Seeded {
        exercise_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reps: Option<u32>,
    },

    /// Progression was enabled for an exercise.
    Enabled { exercise_id: String },

    /// Progression was disabled for an exercise and its state dropped.
    Disabled { exercise_id: String },

    /// An exercise's policy override was set (`None` when cleared).
    OverrideSet {
        exercise_id: String,
        policy: Option<ProgressionPolicy>,
    },
}

impl ProgressionEventType {
    /// Get the event name as a string.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Evaluated { .. } => "evaluated",
            Self::Seeded { .. } => "seeded",
            Self::Enabled { .. } => "enabled",
            Self::Disabled { .. } => "disabled",
            Self::OverrideSet { .. } => "override_set",
        }
    }

    /// The exercise the event is about.
    pub fn exercise_id(&self) -> &str {
        match self {
            Self::Evaluated { exercise_id, .. }
            | Self::Seeded { exercise_id, .. }
            | Self::Enabled { exercise_id }
            | Self::Disabled { exercise_id }
            | Self::OverrideSet { exercise_id, .. } => exercise_id,
        }
    }
}

/// JSONL log writer for progression events.
#[derive(Debug, Clone)]
pub struct HistoryLogger {
    /// Path to the history log file.
    path: PathBuf,
}

impl HistoryLogger {
    /// Create a new history logger with the given path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append an event to the log.
    pub fn append(&self, event: &ProgressionEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| OverloadError::storage(parent, e))?;
        }

        let json = serde_json::to_string(event).map_err(|e| {
            OverloadError::serde(format!("Failed to serialize progression event: {}", e))
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OverloadError::storage(&self.path, e))?;

        writeln!(file, "{}", json).map_err(|e| OverloadError::storage(&self.path, e))?;

        Ok(())
    }

    /// Read all events from the log, oldest first.
    ///
    /// Malformed lines are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<ProgressionEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = read_to_string_limited(&self.path)?;

        let mut events = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProgressionEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(
                    line = line_num + 1,
                    error = %e,
                    "skipping malformed history line"
                ),
            }
        }

        Ok(events)
    }

    /// Read the events of one program, optionally narrowed to one exercise.
    pub fn read_for_program(
        &self,
        program_id: &str,
        exercise_id: Option<&str>,
    ) -> Result<Vec<ProgressionEvent>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.program_id == program_id)
            .filter(|e| exercise_id.is_none_or(|id| e.data.exercise_id() == id))
            .collect())
    }

    /// Read the events of one exercise across all programs.
    pub fn read_for_exercise(&self, exercise_id: &str) -> Result<Vec<ProgressionEvent>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.data.exercise_id() == exercise_id)
            .collect())
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
