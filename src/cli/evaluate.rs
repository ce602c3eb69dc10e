//! Evaluate command for Overload.
//!
//! Reads one exercise's finished session from stdin, runs the progression
//! engine against the stored program, persists the new state and records the
//! result in the history log.

use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::{Engine, Evaluation, ExerciseDefaults, SessionExerciseData};
use crate::error::{FailOpen, OverloadError, Result};
use crate::history::{HistoryLogger, ProgressionEvent};
use crate::storage::ProgramStore;

/// Options for the evaluate command.
#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Input format for evaluation (JSON from stdin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateInput {
    /// Exercise the session data belongs to.
    pub exercise_id: String,
    /// What was performed.
    #[serde(default)]
    pub session: SessionExerciseData,
    /// Catalog defaults for the exercise.
    pub defaults: ExerciseDefaults,
    /// Evaluation time. Defaults to now.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

/// Output format for the evaluate command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Program ID.
    pub program_id: String,
    /// Exercise ID.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub exercise_id: String,
    /// What the engine produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    /// Whether new state was stored.
    pub saved: bool,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluateOutput {
    /// Create a successful output.
    pub fn success(
        program_id: impl Into<String>,
        exercise_id: impl Into<String>,
        evaluation: Evaluation,
        saved: bool,
    ) -> Self {
        Self {
            success: true,
            program_id: program_id.into(),
            exercise_id: exercise_id.into(),
            evaluation: Some(evaluation),
            saved,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(program_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            program_id: program_id.into(),
            exercise_id: String::new(),
            evaluation: None,
            saved: false,
            error: Some(error.into()),
        }
    }
}

/// The evaluate command implementation.
pub struct EvaluateCommand<S: ProgramStore> {
    store: S,
    config: Config,
    history: Option<HistoryLogger>,
}

impl<S: ProgramStore> EvaluateCommand<S> {
    /// Create a new evaluate command.
    pub fn new(store: S, config: Config) -> Self {
        Self {
            store,
            config,
            history: None,
        }
    }

    /// Record evaluations in the given history log.
    pub fn with_history(mut self, history: HistoryLogger) -> Self {
        self.history = Some(history);
        self
    }

    /// Run the evaluate command, reading input from stdin.
    pub fn run(&self, program_id: &str) -> EvaluateOutput {
        let input = match self.read_stdin() {
            Ok(input) => input,
            Err(e) => {
                return EvaluateOutput::failure(program_id, format!("Failed to read stdin: {}", e))
            }
        };

        self.run_with_input(program_id, &input)
    }

    /// Run the evaluate command with provided input.
    pub fn run_with_input(&self, program_id: &str, input: &EvaluateInput) -> EvaluateOutput {
        match self.evaluate(program_id, input) {
            Ok((evaluation, saved)) => {
                EvaluateOutput::success(program_id, input.exercise_id.trim(), evaluation, saved)
            }
            Err(e) => EvaluateOutput::failure(program_id, e.to_string()),
        }
    }

    fn evaluate(&self, program_id: &str, input: &EvaluateInput) -> Result<(Evaluation, bool)> {
        let exercise_id = input.exercise_id.trim();
        if exercise_id.is_empty() {
            return Err(OverloadError::invalid_input("exercise_id must not be empty"));
        }

        let mut program = self.store.require(program_id)?;
        let settings = self.config.engine_settings();
        let engine = Engine::new(settings);
        let now = input.now.unwrap_or_else(Utc::now);

        let evaluation =
            engine.evaluate_session(&program, exercise_id, &input.session, &input.defaults, now);

        let saved = program.apply_evaluation(exercise_id, &evaluation, settings.history_cap);
        if saved {
            self.store.put(&program)?;
            tracing::info!(
                program_id,
                exercise_id,
                status = evaluation.label(),
                "stored progression state"
            );
        }

        if let Some(history) = &self.history {
            if let Some(event) =
                ProgressionEvent::from_evaluation(&program.id, exercise_id, &evaluation, now)
            {
                history
                    .append(&event)
                    .fail_open_default("logging progression event");
            }
        }

        Ok((evaluation, saved))
    }

    /// Read evaluation input from stdin.
    fn read_stdin(&self) -> Result<EvaluateInput> {
        use std::io::Read;

        let stdin = io::stdin();
        let mut input = String::new();

        stdin
            .lock()
            .read_to_string(&mut input)
            .map_err(|e| OverloadError::storage("stdin", e))?;

        if input.trim().is_empty() {
            return Err(OverloadError::serde("No input provided on stdin"));
        }

        serde_json::from_str(&input)
            .map_err(|e| OverloadError::serde(format!("Invalid JSON input: {}", e)))
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &EvaluateOutput, options: &EvaluateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &EvaluateOutput) -> String {
        if !output.success {
            return format!(
                "Evaluation failed: {}",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let Some(evaluation) = &output.evaluation else {
            return String::new();
        };

        let mut lines = Vec::new();
        lines.push(format!(
            "{}/{}: {}",
            output.program_id,
            output.exercise_id,
            evaluation.label()
        ));

        if let Some(outcome) = evaluation.outcome() {
            lines.push(format!("  Outcome:     {}", outcome));
        }
        if let Some(state) = evaluation.state() {
            lines.push(format!("  Confidence:  {:.2}", state.confidence));
            lines.push(format!(
                "  Streaks:     {} success / {} fail",
                state.success_streak, state.fail_streak
            ));
        }
        if let Some(prescription) = evaluation.prescription() {
            lines.push(format!(
                "  Next:        {} sets of {} ({})",
                prescription.sets,
                format_target(prescription.weight, prescription.reps),
                prescription.decision
            ));
        }

        lines.join("\n")
    }
}

fn format_target(weight: Option<f64>, reps: Option<u32>) -> String {
    match (weight, reps) {
        (Some(w), Some(r)) => format!("{} x {}", w, r),
        (Some(w), None) => format!("{}", w),
        (None, Some(r)) => format!("{} reps", r),
        (None, None) => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProgressionOutcome, PrescriptionDecision, SetRecord};
    use crate::history::ProgressionEventType;
    use crate::storage::traits::tests::sample_program;
    use crate::storage::MemoryProgramStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (Arc<MemoryProgramStore>, TempDir, EvaluateCommand<Arc<MemoryProgramStore>>) {
        let store = Arc::new(MemoryProgramStore::new());
        store.put(&sample_program("ul")).unwrap();
        let temp = TempDir::new().unwrap();
        let cmd = EvaluateCommand::new(Arc::clone(&store), Config::default())
            .with_history(HistoryLogger::new(temp.path().join("history.log")));
        (store, temp, cmd)
    }

    fn input(exercise_id: &str, session: SessionExerciseData) -> EvaluateInput {
        EvaluateInput {
            exercise_id: exercise_id.to_string(),
            session,
            defaults: ExerciseDefaults::weighted(3, 8, 95.0),
            now: None,
        }
    }

    fn sets(weight: f64, reps: u32) -> SessionExerciseData {
        SessionExerciseData::with_sets(vec![SetRecord::new(Some(weight), reps); 3])
    }

    #[test]
    fn test_progress_is_persisted_and_logged() {
        let (store, temp, cmd) = setup();

        let output = cmd.run_with_input("ul", &input("bench", sets(135.0, 8)));
        assert!(output.success, "{:?}", output.error);
        assert!(output.saved);

        let evaluation = output.evaluation.unwrap();
        assert_eq!(evaluation.outcome(), Some(ProgressionOutcome::Progress));
        let prescription = evaluation.prescription().unwrap();
        assert_eq!(prescription.decision, PrescriptionDecision::Increase);
        assert_eq!(prescription.weight, Some(140.0));

        let program = store.get("ul").unwrap().unwrap();
        let state = program.progression_state("bench").unwrap();
        assert_eq!(state.last_prescribed_weight, Some(140.0));
        assert_eq!(state.success_streak, 0);

        let events = HistoryLogger::new(temp.path().join("history.log"))
            .read_all()
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].data,
            ProgressionEventType::Evaluated {
                outcome: ProgressionOutcome::Progress,
                ..
            }
        ));
    }

    #[test]
    fn test_first_session_seeds_from_defaults() {
        let (store, _temp, cmd) = setup();
        let mut program = store.get("ul").unwrap().unwrap();
        program.set_progression_enabled("row", true);
        store.put(&program).unwrap();

        let output = cmd.run_with_input("ul", &input("row", sets(95.0, 8)));
        assert!(output.success);
        assert!(output.saved);
        assert_eq!(output.evaluation.as_ref().unwrap().label(), "seeded");

        let program = store.get("ul").unwrap().unwrap();
        let state = program.progression_state("row").unwrap();
        assert_eq!(state.last_prescribed_weight, Some(95.0));
        assert_eq!(state.last_prescribed_reps, Some(8));
    }

    #[test]
    fn test_skipped_session_leaves_state_alone() {
        let (store, temp, cmd) = setup();
        let before = store.get("ul").unwrap().unwrap();

        let output = cmd.run_with_input("ul", &input("bench", SessionExerciseData::skipped()));
        assert!(output.success);
        assert!(!output.saved);
        assert_eq!(output.evaluation, Some(Evaluation::NoOutcome));
        assert_eq!(store.get("ul").unwrap().unwrap(), before);

        let events = HistoryLogger::new(temp.path().join("history.log"))
            .read_all()
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_inactive_exercise() {
        let (_store, _temp, cmd) = setup();
        let output = cmd.run_with_input("ul", &input("deadlift", sets(225.0, 5)));
        assert!(output.success);
        assert!(!output.saved);
        assert_eq!(output.evaluation, Some(Evaluation::Inactive));
    }

    #[test]
    fn test_missing_program_and_blank_exercise() {
        let (_store, _temp, cmd) = setup();

        let output = cmd.run_with_input("nope", &input("bench", sets(135.0, 8)));
        assert!(!output.success);
        assert!(output.error.unwrap().contains("nope"));

        let output = cmd.run_with_input("ul", &input("  ", sets(135.0, 8)));
        assert!(!output.success);
    }

    #[test]
    fn test_input_parsing() {
        let json = r#"{
            "exercise_id": "bench",
            "session": {"sets": [{"weight": 135.0, "reps": 8}, {"reps": 8, "completed": false}]},
            "defaults": {"scheme": {"sets": 3, "reps": 8, "weight": 95.0}},
            "now": "2026-03-01T10:00:00Z"
        }"#;
        let input: EvaluateInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.session.sets.len(), 2);
        assert!(!input.session.sets[1].completed);
        assert!(input.now.is_some());

        let minimal: EvaluateInput = serde_json::from_str(
            r#"{"exercise_id": "row", "defaults": {"scheme": {"sets": 3, "reps": 10}}}"#,
        )
        .unwrap();
        assert!(!minimal.session.has_completed_work());
    }

    #[test]
    fn test_format_output() {
        let (_store, _temp, cmd) = setup();
        let output = cmd.run_with_input("ul", &input("bench", sets(135.0, 8)));

        let text = cmd.format_output(&output, &EvaluateOptions::default());
        assert!(text.contains("ul/bench: evaluated"));
        assert!(text.contains("3 sets of 140 x 8 (increase)"));

        let json = cmd.format_output(
            &output,
            &EvaluateOptions {
                json: true,
                ..Default::default()
            },
        );
        assert!(json.contains("\"status\": \"evaluated\""));

        let quiet = cmd.format_output(
            &output,
            &EvaluateOptions {
                quiet: true,
                ..Default::default()
            },
        );
        assert!(quiet.is_empty());
    }
}
