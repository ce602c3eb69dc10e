//! End-of-session evaluation for a single exercise.
//!
//! Runs the classifier, the state updater and the prescriber in order. The
//! engine only reads the program; callers persist the result through
//! [`Program::apply_evaluation`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::classifier::{classify, PrescribedTarget, SessionExerciseData};
use crate::core::outcome::ProgressionOutcome;
use crate::core::prescriber::{prescribe, ExerciseDefaults, PrescriberSettings, Prescription};
use crate::core::program::Program;
use crate::core::state::{ExerciseProgressionState, DEFAULT_HISTORY_CAP};

/// Tunables for the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Cap on each exercise's outcome history.
    pub history_cap: usize,
    /// Confidence given to a freshly created state. Seeding raises it to the
    /// prescriber's confidence floor.
    pub initial_confidence: f64,
    /// Prescriber tunables.
    pub prescriber: PrescriberSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            initial_confidence: 0.0,
            prescriber: PrescriberSettings::default(),
        }
    }
}

/// Result of a classified and prescribed session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEvaluation {
    /// How the session went.
    pub outcome: ProgressionOutcome,
    /// State right after the outcome was applied, before the prescriber ran.
    pub advanced: ExerciseProgressionState,
    /// State to persist.
    pub state: ExerciseProgressionState,
    /// Target for the next session.
    pub prescription: Prescription,
}

/// What evaluating one exercise of one session produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    /// Progression is not active for the exercise.
    Inactive,
    /// Nothing to evaluate; stored state must be left alone.
    NoOutcome,
    /// First session for the exercise; the prescription came from defaults.
    Seeded {
        state: ExerciseProgressionState,
        prescription: Prescription,
    },
    /// A full classify, update and prescribe pass.
    Evaluated(SessionEvaluation),
}

impl Evaluation {
    /// The state to persist, if any.
    pub fn state(&self) -> Option<&ExerciseProgressionState> {
        match self {
            Evaluation::Seeded { state, .. } => Some(state),
            Evaluation::Evaluated(eval) => Some(&eval.state),
            Evaluation::Inactive | Evaluation::NoOutcome => None,
        }
    }

    /// The next-session prescription, if any.
    pub fn prescription(&self) -> Option<&Prescription> {
        match self {
            Evaluation::Seeded { prescription, .. } => Some(prescription),
            Evaluation::Evaluated(eval) => Some(&eval.prescription),
            Evaluation::Inactive | Evaluation::NoOutcome => None,
        }
    }

    /// The classified outcome, if the session was classified.
    pub fn outcome(&self) -> Option<ProgressionOutcome> {
        match self {
            Evaluation::Evaluated(eval) => Some(eval.outcome),
            _ => None,
        }
    }

    /// Short label for output.
    pub fn label(&self) -> &'static str {
        match self {
            Evaluation::Inactive => "inactive",
            Evaluation::NoOutcome => "no outcome",
            Evaluation::Seeded { .. } => "seeded",
            Evaluation::Evaluated(_) => "evaluated",
        }
    }
}

/// The progression engine.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    settings: EngineSettings,
}

impl Engine {
    /// Create an engine with the given settings.
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// The settings in use.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Evaluate one exercise of a finished session.
    ///
    /// Pure with respect to its inputs: the same program, session and `now`
    /// always produce the same evaluation.
    pub fn evaluate_session(
        &self,
        program: &Program,
        exercise_id: &str,
        session: &SessionExerciseData,
        defaults: &ExerciseDefaults,
        now: DateTime<Utc>,
    ) -> Evaluation {
        if !program.is_progression_active(exercise_id) {
            tracing::debug!(exercise_id, "progression inactive, skipping evaluation");
            return Evaluation::Inactive;
        }

        if !session.has_completed_work() {
            tracing::debug!(exercise_id, "no completed working sets, leaving state untouched");
            return Evaluation::NoOutcome;
        }

        let policy = program.effective_policy(exercise_id);
        let rules = policy.rules();
        debug_assert!(rules.validate(), "invalid policy rules for {}", policy);

        let cap = self.settings.history_cap.max(1);
        let current = program
            .progression_state(exercise_id)
            .cloned()
            .unwrap_or_else(|| ExerciseProgressionState::new(self.settings.initial_confidence, now));

        let Some(target) = PrescribedTarget::from_state(&current) else {
            let (mut state, prescription) =
                prescribe(&current, &rules, defaults, &self.settings.prescriber, now);
            // Start at the floor so the first increase waits on the policy's
            // progress threshold only.
            state.confidence = state
                .confidence
                .max(self.settings.prescriber.confidence_floor);
            tracing::info!(exercise_id, %policy, "seeded first prescription");
            return Evaluation::Seeded {
                state: state.normalized(cap),
                prescription,
            };
        };

        let Some(outcome) = classify(Some(&target), session) else {
            return Evaluation::NoOutcome;
        };

        let advanced = current.advance(outcome, &rules, cap, now);
        let (state, prescription) =
            prescribe(&advanced, &rules, defaults, &self.settings.prescriber, now);

        tracing::info!(
            exercise_id,
            %policy,
            %outcome,
            confidence = state.confidence,
            decision = %prescription.decision,
            "evaluated session"
        );

        Evaluation::Evaluated(SessionEvaluation {
            outcome,
            advanced,
            state,
            prescription,
        })
    }
}
