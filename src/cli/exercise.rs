//! Exercise progression commands for Overload.
//!
//! Enables or disables progression for an exercise of a program and sets or
//! clears its policy override. Disabling drops the exercise's stored state.

use serde::{Deserialize, Serialize};

use crate::core::{ExerciseProgressionStatus, Program, ProgressionPolicy};
use crate::error::{FailOpen, OverloadError, Result};
use crate::history::{HistoryLogger, ProgressionEvent, ProgressionEventType};
use crate::storage::ProgramStore;

/// Options for the exercise commands.
#[derive(Debug, Clone, Default)]
pub struct ExerciseOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// A change to one exercise's progression settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExerciseAction {
    /// Turn progression on.
    Enable,
    /// Turn progression off and drop stored state.
    Disable,
    /// Set the policy override.
    Override(ProgressionPolicy),
    /// Remove the policy override.
    ClearOverride,
}

impl ExerciseAction {
    /// Get the display name for this action.
    pub fn display_name(&self) -> &'static str {
        match self {
            ExerciseAction::Enable => "enable",
            ExerciseAction::Disable => "disable",
            ExerciseAction::Override(_) => "override",
            ExerciseAction::ClearOverride => "clear_override",
        }
    }
}

/// Output format for the exercise commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Program ID.
    pub program_id: String,
    /// Exercise ID.
    pub exercise_id: String,
    /// Action that was requested.
    pub action: String,
    /// Whether anything changed.
    pub changed: bool,
    /// Lifecycle status after the command.
    pub status: ExerciseProgressionStatus,
    /// Policy in force after the command.
    pub effective_policy: ProgressionPolicy,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExerciseOutput {
    /// Create a successful output.
    pub fn success(
        program: &Program,
        exercise_id: &str,
        action: ExerciseAction,
        changed: bool,
    ) -> Self {
        Self {
            success: true,
            program_id: program.id.clone(),
            exercise_id: exercise_id.to_string(),
            action: action.display_name().to_string(),
            changed,
            status: program.exercise_status(exercise_id),
            effective_policy: program.effective_policy(exercise_id),
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(
        program_id: &str,
        exercise_id: &str,
        action: ExerciseAction,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            program_id: program_id.to_string(),
            exercise_id: exercise_id.to_string(),
            action: action.display_name().to_string(),
            changed: false,
            status: ExerciseProgressionStatus::default(),
            effective_policy: ProgressionPolicy::default(),
            error: Some(error.into()),
        }
    }
}

/// The exercise command implementation.
pub struct ExerciseCommand<S: ProgramStore> {
    store: S,
    history: Option<HistoryLogger>,
}

impl<S: ProgramStore> ExerciseCommand<S> {
    /// Create a new exercise command.
    pub fn new(store: S) -> Self {
        Self {
            store,
            history: None,
        }
    }

    /// Record changes in the given history log.
    pub fn with_history(mut self, history: HistoryLogger) -> Self {
        self.history = Some(history);
        self
    }

    /// Apply an action to one exercise of a program.
    pub fn run(
        &self,
        program_id: &str,
        exercise_id: &str,
        action: ExerciseAction,
    ) -> ExerciseOutput {
        match self.apply(program_id, exercise_id, action) {
            Ok((program, changed)) => {
                ExerciseOutput::success(&program, exercise_id, action, changed)
            }
            Err(e) => ExerciseOutput::failure(program_id, exercise_id, action, e.to_string()),
        }
    }

    fn apply(
        &self,
        program_id: &str,
        exercise_id: &str,
        action: ExerciseAction,
    ) -> Result<(Program, bool)> {
        let exercise_id = exercise_id.trim();
        if exercise_id.is_empty() {
            return Err(OverloadError::invalid_input("exercise id must not be empty"));
        }

        let mut program = self.store.require(program_id)?;
        let before = program.clone();

        let event = match action {
            ExerciseAction::Enable => {
                program.set_progression_enabled(exercise_id, true);
                ProgressionEventType::Enabled {
                    exercise_id: exercise_id.to_string(),
                }
            }
            ExerciseAction::Disable => {
                program.set_progression_enabled(exercise_id, false);
                ProgressionEventType::Disabled {
                    exercise_id: exercise_id.to_string(),
                }
            }
            ExerciseAction::Override(policy) => {
                if !program.set_progression_override(exercise_id, policy) {
                    return Err(OverloadError::invalid_input(format!(
                        "progression is not enabled for '{}'; enable it first",
                        exercise_id
                    )));
                }
                ProgressionEventType::OverrideSet {
                    exercise_id: exercise_id.to_string(),
                    policy: Some(policy),
                }
            }
            ExerciseAction::ClearOverride => {
                program.clear_progression_override(exercise_id);
                ProgressionEventType::OverrideSet {
                    exercise_id: exercise_id.to_string(),
                    policy: None,
                }
            }
        };

        let changed = program != before;
        if changed {
            self.store.put(&program)?;
            if let Some(history) = &self.history {
                history
                    .append(&ProgressionEvent::new(&program.id, event))
                    .fail_open_default("logging progression event");
            }
        }

        Ok((program, changed))
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ExerciseOutput, options: &ExerciseOptions) -> String {
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
    fn format_human_readable(&self, output: &ExerciseOutput) -> String {
        if !output.success {
            return format!(
                "{} failed: {}",
                output.action,
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let prefix = if output.changed { "Updated" } else { "Unchanged" };
        format!(
            "{} {}/{}: {} (policy: {})",
            prefix,
            output.program_id,
            output.exercise_id,
            output.status.display_name(),
            output.effective_policy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::sample_program;
    use crate::storage::MemoryProgramStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (Arc<MemoryProgramStore>, TempDir, ExerciseCommand<Arc<MemoryProgramStore>>) {
        let store = Arc::new(MemoryProgramStore::new());
        store.put(&sample_program("ul")).unwrap();
        let temp = TempDir::new().unwrap();
        let cmd = ExerciseCommand::new(Arc::clone(&store))
            .with_history(HistoryLogger::new(temp.path().join("history.log")));
        (store, temp, cmd)
    }

    #[test]
    fn test_enable_then_override() {
        let (store, _temp, cmd) = setup();

        let output = cmd.run("ul", "squat", ExerciseAction::Enable);
        assert!(output.success);
        assert!(output.changed);
        assert_eq!(output.status, ExerciseProgressionStatus::Untracked);

        let action = ExerciseAction::Override(ProgressionPolicy::Adaptive);
        let output = cmd.run("ul", "squat", action);
        assert!(output.success);
        assert_eq!(output.effective_policy, ProgressionPolicy::Adaptive);

        let program = store.get("ul").unwrap().unwrap();
        assert_eq!(program.effective_policy("squat"), ProgressionPolicy::Adaptive);
    }

    #[test]
    fn test_disable_drops_state_and_override() {
        let (store, _temp, cmd) = setup();

        let output = cmd.run("ul", "bench", ExerciseAction::Disable);
        assert!(output.success);
        assert_eq!(output.status, ExerciseProgressionStatus::Disabled);

        let program = store.get("ul").unwrap().unwrap();
        assert!(program.progression_state("bench").is_none());
        assert!(program.exercise_progression_overrides.is_empty());
    }

    #[test]
    fn test_override_on_disabled_exercise_fails() {
        let (store, _temp, cmd) = setup();
        let before = store.get("ul").unwrap().unwrap();

        let action = ExerciseAction::Override(ProgressionPolicy::Moderate);
        let output = cmd.run("ul", "deadlift", action);
        assert!(!output.success);
        assert!(output.error.unwrap().contains("not enabled"));
        assert_eq!(store.get("ul").unwrap().unwrap(), before);
    }

    #[test]
    fn test_repeat_enable_is_unchanged() {
        let (_store, temp, cmd) = setup();

        let output = cmd.run("ul", "bench", ExerciseAction::Enable);
        assert!(output.success);
        assert!(!output.changed);

        // Nothing changed, nothing logged
        let logger = HistoryLogger::new(temp.path().join("history.log"));
        assert!(logger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_changes_are_logged() {
        let (_store, temp, cmd) = setup();

        cmd.run("ul", "squat", ExerciseAction::Enable);
        cmd.run("ul", "bench", ExerciseAction::ClearOverride);
        cmd.run("ul", "bench", ExerciseAction::Disable);

        let logger = HistoryLogger::new(temp.path().join("history.log"));
        let names: Vec<_> = logger
            .read_all()
            .unwrap()
            .iter()
            .map(|e| e.data.event_name())
            .collect();
        assert_eq!(names, vec!["enabled", "override_set", "disabled"]);
    }

    #[test]
    fn test_missing_program() {
        let (_store, _temp, cmd) = setup();
        let output = cmd.run("nope", "bench", ExerciseAction::Enable);
        assert!(!output.success);
    }

    #[test]
    fn test_format_output() {
        let (_store, _temp, cmd) = setup();
        let output = cmd.run("ul", "squat", ExerciseAction::Enable);

        let text = cmd.format_output(&output, &ExerciseOptions::default());
        assert!(text.contains("Updated ul/squat"));

        let json = cmd.format_output(
            &output,
            &ExerciseOptions {
                json: true,
                ..Default::default()
            },
        );
        assert!(json.contains("\"status\": \"untracked\""));
    }
}
