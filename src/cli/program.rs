//! Program command for Overload.
//!
//! Creates, inspects, lists, toggles and deletes programs.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::{ExerciseProgressionStatus, Program, ProgressionOutcome, ProgressionPolicy};
use crate::error::{OverloadError, Result};
use crate::storage::ProgramStore;
use crate::util::validate_id;

/// Options for the program command.
#[derive(Debug, Clone, Default)]
pub struct ProgramOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// One-line summary of a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSummary {
    /// Program ID.
    pub id: String,
    /// Program name.
    pub name: String,
    /// Program-level master switch.
    pub progression_enabled: bool,
    /// Program-level policy.
    pub policy: ProgressionPolicy,
    /// Number of exercises with progression enabled.
    pub enabled_exercises: usize,
    /// Number of exercises with stored state.
    pub tracked_exercises: usize,
    /// Last updated timestamp (ISO 8601).
    pub updated_at: String,
}

impl From<&Program> for ProgramSummary {
    fn from(program: &Program) -> Self {
        Self {
            id: program.id.clone(),
            name: program.name.clone(),
            progression_enabled: program.progression_enabled,
            policy: program.progression_policy,
            enabled_exercises: program.progression_enabled_exercises.len(),
            tracked_exercises: program.exercise_progression_states.len(),
            updated_at: program.updated_at.to_rfc3339(),
        }
    }
}

/// Progression detail of one enabled exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseSummary {
    /// Exercise ID.
    pub exercise_id: String,
    /// Lifecycle status.
    pub status: ExerciseProgressionStatus,
    /// Policy in force.
    pub policy: ProgressionPolicy,
    /// Whether the policy comes from an override.
    pub overridden: bool,
    /// Last prescribed weight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Last prescribed reps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    /// Current confidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Current success streak.
    pub success_streak: u32,
    /// Current fail streak.
    pub fail_streak: u32,
    /// Recent outcomes, oldest first.
    pub recent_outcomes: Vec<ProgressionOutcome>,
}

impl ExerciseSummary {
    fn new(program: &Program, exercise_id: &str) -> Self {
        let state = program.progression_state(exercise_id);
        Self {
            exercise_id: exercise_id.to_string(),
            status: program.exercise_status(exercise_id),
            policy: program.effective_policy(exercise_id),
            overridden: program
                .exercise_progression_overrides
                .contains_key(exercise_id),
            weight: state.and_then(|s| s.last_prescribed_weight),
            reps: state.and_then(|s| s.last_prescribed_reps),
            confidence: state.map(|s| s.confidence),
            success_streak: state.map(|s| s.success_streak).unwrap_or(0),
            fail_streak: state.map(|s| s.fail_streak).unwrap_or(0),
            recent_outcomes: state.map(|s| s.recent_outcomes.clone()).unwrap_or_default(),
        }
    }
}

/// Output format for the program command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Programs affected or listed.
    pub programs: Vec<ProgramSummary>,
    /// Per-exercise detail (only for `show`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exercises: Vec<ExerciseSummary>,
    /// What happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgramOutput {
    /// Create a successful output.
    pub fn success(programs: Vec<ProgramSummary>, message: Option<String>) -> Self {
        Self {
            success: true,
            programs,
            exercises: Vec::new(),
            message,
            error: None,
        }
    }

    /// Create a successful output with per-exercise detail.
    pub fn detail(program: &Program) -> Self {
        let exercises = program
            .progression_enabled_exercises
            .iter()
            .map(|id| ExerciseSummary::new(program, id))
            .collect();
        Self {
            success: true,
            programs: vec![ProgramSummary::from(program)],
            exercises,
            message: None,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            programs: Vec::new(),
            exercises: Vec::new(),
            message: None,
            error: Some(error.into()),
        }
    }
}

/// The program command implementation.
pub struct ProgramCommand<S: ProgramStore> {
    store: S,
    config: Config,
}

impl<S: ProgramStore> ProgramCommand<S> {
    /// Create a new program command.
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// Create a program. Fails if the id is taken.
    pub fn create(
        &self,
        id: &str,
        name: Option<&str>,
        policy: Option<ProgressionPolicy>,
    ) -> ProgramOutput {
        match self.try_create(id, name, policy) {
            Ok(program) => ProgramOutput::success(
                vec![ProgramSummary::from(&program)],
                Some(format!("Created program '{}'", program.id)),
            ),
            Err(e) => ProgramOutput::failure(format!("Failed to create program: {}", e)),
        }
    }

    fn try_create(
        &self,
        id: &str,
        name: Option<&str>,
        policy: Option<ProgressionPolicy>,
    ) -> Result<Program> {
        validate_id(id)?;
        if self.store.exists(id)? {
            return Err(OverloadError::invalid_input(format!(
                "program '{}' already exists",
                id
            )));
        }

        let policy = policy.unwrap_or(self.config.progression.default_policy);
        let program = Program::new(id, name.unwrap_or(id)).with_policy(policy);
        self.store.put(&program)?;
        tracing::info!(program_id = id, %policy, "created program");
        Ok(program)
    }

    /// Show one program with its exercises.
    pub fn show(&self, id: &str) -> ProgramOutput {
        match self.store.require(id) {
            Ok(program) => ProgramOutput::detail(&program),
            Err(e) => ProgramOutput::failure(format!("Failed to load program: {}", e)),
        }
    }

    /// List programs, most recently updated first.
    pub fn list(&self, limit: usize) -> ProgramOutput {
        match self.store.list(limit) {
            Ok(programs) => {
                ProgramOutput::success(programs.iter().map(ProgramSummary::from).collect(), None)
            }
            Err(e) => ProgramOutput::failure(format!("Failed to list programs: {}", e)),
        }
    }

    /// Turn the program-level master switch on or off.
    pub fn toggle(&self, id: &str, enabled: bool) -> ProgramOutput {
        let result = self.store.require(id).and_then(|mut program| {
            program.set_program_progression(enabled);
            self.store.put(&program)?;
            Ok(program)
        });

        match result {
            Ok(program) => ProgramOutput::success(
                vec![ProgramSummary::from(&program)],
                Some(format!(
                    "Progression {} for program '{}'",
                    if enabled { "enabled" } else { "disabled" },
                    program.id
                )),
            ),
            Err(e) => ProgramOutput::failure(format!("Failed to toggle program: {}", e)),
        }
    }

    /// Delete a program and all of its progression data.
    pub fn delete(&self, id: &str) -> ProgramOutput {
        let result = self.store.require(id).and_then(|program| {
            self.store.delete(&program.id)?;
            Ok(program)
        });

        match result {
            Ok(program) => {
                tracing::info!(program_id = id, "deleted program");
                ProgramOutput::success(
                    vec![ProgramSummary::from(&program)],
                    Some(format!("Deleted program '{}'", program.id)),
                )
            }
            Err(e) => ProgramOutput::failure(format!("Failed to delete program: {}", e)),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ProgramOutput, options: &ProgramOptions) -> String {
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
    fn format_human_readable(&self, output: &ProgramOutput) -> String {
        if !output.success {
            return format!(
                "Program command failed: {}",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        if let Some(message) = &output.message {
            lines.push(message.clone());
        }

        if output.programs.is_empty() {
            lines.push("No programs found.".to_string());
            return lines.join("\n");
        }

        lines.push(format!(
            "{:<24}  {:<12}  {:<8}  {:<8}  {}",
            "ID", "POLICY", "ACTIVE", "ENABLED", "UPDATED"
        ));
        lines.push("-".repeat(80));
        for program in &output.programs {
            let updated: String = program.updated_at.chars().take(19).collect();
            lines.push(format!(
                "{:<24}  {:<12}  {:<8}  {:<8}  {}",
                program.id,
                program.policy,
                if program.progression_enabled { "yes" } else { "no" },
                program.enabled_exercises,
                updated
            ));
        }

        if !output.exercises.is_empty() {
            lines.push(String::new());
            lines.push(format!(
                "{:<20}  {:<20}  {:<14}  {:<10}  {:<6}  {}",
                "EXERCISE", "STATUS", "POLICY", "WEIGHT", "REPS", "CONFIDENCE"
            ));
            lines.push("-".repeat(90));
            for ex in &output.exercises {
                let policy = if ex.overridden {
                    format!("{}*", ex.policy)
                } else {
                    ex.policy.to_string()
                };
                lines.push(format!(
                    "{:<20}  {:<20}  {:<14}  {:<10}  {:<6}  {}",
                    ex.exercise_id,
                    ex.status.display_name(),
                    policy,
                    ex.weight.map(|w| w.to_string()).unwrap_or_else(|| "-".into()),
                    ex.reps.map(|r| r.to_string()).unwrap_or_else(|| "-".into()),
                    ex.confidence
                        .map(|c| format!("{:.2}", c))
                        .unwrap_or_else(|| "-".into()),
                ));
            }
        }

        lines.join("\n")
    }
}
