//! The program aggregate and its progression store operations.
//!
//! A program owns three per-exercise maps: which exercises have progression
//! enabled, which of those override the program's policy, and the
//! progression state of each tracked exercise. An exercise id only ever
//! appears in the override or state maps while it is in the enabled set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::engine::Evaluation;
use crate::core::policy::ProgressionPolicy;
use crate::core::state::ExerciseProgressionState;

/// Where an exercise sits in the progression lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseProgressionStatus {
    /// Progression is off for the exercise.
    #[default]
    Disabled,
    /// Enabled, but no session has been evaluated yet.
    Untracked,
    /// Enabled with stored progression state.
    Tracking,
}

impl ExerciseProgressionStatus {
    /// Get the display name for this status.
    pub fn display_name(&self) -> &'static str {
        match self {
            ExerciseProgressionStatus::Disabled => "disabled",
            ExerciseProgressionStatus::Untracked => "enabled (untracked)",
            ExerciseProgressionStatus::Tracking => "tracking",
        }
    }
}

/// A training program with its progression configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    /// Unique program identifier, also the storage key.
    pub id: String,
    /// Human readable name.
    #[serde(default)]
    pub name: String,
    /// When the program was created.
    pub created_at: DateTime<Utc>,
    /// When the program was last changed.
    pub updated_at: DateTime<Utc>,
    /// Program-level master switch.
    #[serde(default)]
    pub progression_enabled: bool,
    /// Policy used by exercises without an override.
    #[serde(default)]
    pub progression_policy: ProgressionPolicy,
    /// Exercises with progression turned on.
    #[serde(default)]
    pub progression_enabled_exercises: BTreeSet<String>,
    /// Per-exercise policy overrides.
    #[serde(default)]
    pub exercise_progression_overrides: BTreeMap<String, ProgressionPolicy>,
    /// Per-exercise progression state.
    #[serde(default)]
    pub exercise_progression_states: BTreeMap<String, ExerciseProgressionState>,
}

impl Program {
    /// Create an empty program with progression switched off.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            progression_enabled: false,
            progression_policy: ProgressionPolicy::default(),
            progression_enabled_exercises: BTreeSet::new(),
            exercise_progression_overrides: BTreeMap::new(),
            exercise_progression_states: BTreeMap::new(),
        }
    }

    /// Set the program-level policy.
    pub fn with_policy(mut self, policy: ProgressionPolicy) -> Self {
        self.progression_policy = policy;
        self
    }

    /// Update the program's updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Turn the program-level master switch on or off.
    ///
    /// Per-exercise flags, overrides and states are kept either way.
    pub fn set_program_progression(&mut self, enabled: bool) {
        if self.progression_enabled != enabled {
            self.progression_enabled = enabled;
            self.touch();
        }
    }

    /// Change the program-level policy.
    pub fn set_progression_policy(&mut self, policy: ProgressionPolicy) {
        if self.progression_policy != policy {
            self.progression_policy = policy;
            self.touch();
        }
    }

    /// Enable or disable progression for one exercise.
    ///
    /// Enabling only records the flag; state is created lazily by the first
    /// evaluated session. Disabling removes the flag, the override and the
    /// stored state. Disabled exercises do not keep their history.
    pub fn set_progression_enabled(&mut self, exercise_id: &str, enabled: bool) {
        let changed = if enabled {
            self.progression_enabled_exercises
                .insert(exercise_id.to_string())
        } else {
            let flag = self.progression_enabled_exercises.remove(exercise_id);
            let over = self
                .exercise_progression_overrides
                .remove(exercise_id)
                .is_some();
            let state = self.exercise_progression_states.remove(exercise_id).is_some();
            flag || over || state
        };

        if changed {
            tracing::debug!(exercise_id, enabled, "exercise progression toggled");
            self.touch();
        }
    }

    /// Set or replace the policy override for an enabled exercise.
    ///
    /// Returns `false` without changing anything when the exercise is not
    /// enabled. Overrides are never stored for disabled exercises, so a
    /// program can't carry an override that disabling would have removed.
    pub fn set_progression_override(
        &mut self,
        exercise_id: &str,
        policy: ProgressionPolicy,
    ) -> bool {
        if !self.is_exercise_enabled(exercise_id) {
            tracing::debug!(exercise_id, "override ignored for disabled exercise");
            return false;
        }
        let previous = self
            .exercise_progression_overrides
            .insert(exercise_id.to_string(), policy);
        if previous != Some(policy) {
            self.touch();
        }
        true
    }

    /// Remove an exercise's override. Returns whether one was present.
    pub fn clear_progression_override(&mut self, exercise_id: &str) -> bool {
        let removed = self
            .exercise_progression_overrides
            .remove(exercise_id)
            .is_some();
        if removed {
            self.touch();
        }
        removed
    }

    /// Replace an enabled exercise's progression state.
    ///
    /// The state is normalized against `history_cap` before it is stored.
    /// Storing the same state twice leaves the program unchanged. Returns
    /// `false` without changing anything when the exercise is not enabled.
    pub fn set_progression_state(
        &mut self,
        exercise_id: &str,
        state: ExerciseProgressionState,
        history_cap: usize,
    ) -> bool {
        if !self.is_exercise_enabled(exercise_id) {
            tracing::debug!(exercise_id, "state ignored for disabled exercise");
            return false;
        }
        let state = state.normalized(history_cap);
        if self.exercise_progression_states.get(exercise_id) != Some(&state) {
            self.exercise_progression_states
                .insert(exercise_id.to_string(), state);
            self.touch();
        }
        true
    }

    /// Store the state produced by an engine evaluation.
    ///
    /// Returns `true` when a state was stored. Evaluations that carry no
    /// state (inactive or nothing to evaluate) leave the program untouched.
    pub fn apply_evaluation(
        &mut self,
        exercise_id: &str,
        evaluation: &Evaluation,
        history_cap: usize,
    ) -> bool {
        match evaluation.state() {
            Some(state) => self.set_progression_state(exercise_id, state.clone(), history_cap),
            None => false,
        }
    }

    /// Whether the per-exercise flag is on.
    pub fn is_exercise_enabled(&self, exercise_id: &str) -> bool {
        self.progression_enabled_exercises.contains(exercise_id)
    }

    /// Whether sessions of this exercise should be evaluated.
    ///
    /// Requires both the program switch and the exercise flag.
    pub fn is_progression_active(&self, exercise_id: &str) -> bool {
        self.progression_enabled && self.is_exercise_enabled(exercise_id)
    }

    /// The policy in force for an exercise: its override, else the program's.
    pub fn effective_policy(&self, exercise_id: &str) -> ProgressionPolicy {
        self.exercise_progression_overrides
            .get(exercise_id)
            .copied()
            .unwrap_or(self.progression_policy)
    }

    /// Stored state for an exercise, if tracked.
    pub fn progression_state(&self, exercise_id: &str) -> Option<&ExerciseProgressionState> {
        self.exercise_progression_states.get(exercise_id)
    }

    /// Lifecycle position of an exercise.
    pub fn exercise_status(&self, exercise_id: &str) -> ExerciseProgressionStatus {
        if !self.is_exercise_enabled(exercise_id) {
            ExerciseProgressionStatus::Disabled
        } else if self.exercise_progression_states.contains_key(exercise_id) {
            ExerciseProgressionStatus::Tracking
        } else {
            ExerciseProgressionStatus::Untracked
        }
    }

    /// Check that overrides and states only exist for enabled exercises.
    pub fn is_consistent(&self) -> bool {
        self.exercise_progression_overrides
            .keys()
            .chain(self.exercise_progression_states.keys())
            .all(|id| self.progression_enabled_exercises.contains(id))
    }

    /// Drop overrides and states of exercises that are not enabled.
    ///
    /// Loaded programs may come from hand-edited files; this brings them back
    /// in line with [`Program::is_consistent`]. `updated_at` is left alone.
    pub fn normalized(mut self) -> Self {
        let enabled = &self.progression_enabled_exercises;
        let before = (
            self.exercise_progression_overrides.len(),
            self.exercise_progression_states.len(),
        );
        self.exercise_progression_overrides
            .retain(|id, _| enabled.contains(id));
        self.exercise_progression_states
            .retain(|id, _| enabled.contains(id));

        let dropped_overrides = before.0 - self.exercise_progression_overrides.len();
        let dropped_states = before.1 - self.exercise_progression_states.len();
        if dropped_overrides + dropped_states > 0 {
            tracing::warn!(
                program_id = %self.id,
                dropped_overrides,
                dropped_states,
                "dropped progression data for exercises that are not enabled"
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::ProgressionOutcome;
    use crate::core::state::DEFAULT_HISTORY_CAP;

    #[test]
    fn test_normalized_drops_orphaned_entries() {
        let json = r#"{
            "id": "edited",
            "name": "Edited",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
            "progression_enabled": true,
            "progression_enabled_exercises": ["bench"],
            "exercise_progression_overrides": {"squat": "adaptive", "bench": "conservative"},
            "exercise_progression_states": {
                "squat": {"last_prescribed_weight": 225.0, "last_prescribed_reps": 5},
                "bench": {"last_prescribed_weight": 135.0, "last_prescribed_reps": 8}
            }
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert!(!program.is_consistent());
        let updated_at = program.updated_at;

        let program = program.normalized();
        assert!(program.is_consistent());
        assert_eq!(program.updated_at, updated_at);
        assert!(program.progression_state("squat").is_none());
        assert!(!program.exercise_progression_overrides.contains_key("squat"));
        assert_eq!(
            program.effective_policy("bench"),
            ProgressionPolicy::Conservative
        );
        assert_eq!(
            program.progression_state("bench").unwrap().last_prescribed_weight,
            Some(135.0)
        );
    }

    fn sample_state() -> ExerciseProgressionState {
        let mut state = ExerciseProgressionState::new(0.0, Utc::now())
            .with_prescription(Some(135.0), Some(8));
        state.success_streak = 2;
        state.fail_streak = 0;
        state.recent_outcomes = vec![ProgressionOutcome::Progress, ProgressionOutcome::Stay];
        state.confidence = 0.8;
        state
    }

    fn program_with(exercise: &str) -> Program {
        let mut program = Program::new("ppl", "Push Pull Legs");
        program.set_program_progression(true);
        program.set_progression_enabled(exercise, true);
        program
    }

    #[test]
    fn test_new_program_defaults() {
        let program = Program::new("ppl", "Push Pull Legs");
        assert!(!program.progression_enabled);
        assert_eq!(program.progression_policy, ProgressionPolicy::Moderate);
        assert!(program.progression_enabled_exercises.is_empty());
        assert!(program.is_consistent());
    }

    #[test]
    fn test_enable_creates_no_state() {
        let program = program_with("bench");
        assert!(program.is_exercise_enabled("bench"));
        assert!(program.progression_state("bench").is_none());
        assert_eq!(
            program.exercise_status("bench"),
            ExerciseProgressionStatus::Untracked
        );
    }

    #[test]
    fn test_disable_is_destructive() {
        let mut program = program_with("bench");
        assert!(program.set_progression_override("bench", ProgressionPolicy::Adaptive));
        assert!(program.set_progression_state("bench", sample_state(), DEFAULT_HISTORY_CAP));
        assert_eq!(
            program.exercise_status("bench"),
            ExerciseProgressionStatus::Tracking
        );

        program.set_progression_enabled("bench", false);

        assert!(!program.is_exercise_enabled("bench"));
        assert!(program.exercise_progression_overrides.get("bench").is_none());
        assert!(program.progression_state("bench").is_none());
        assert_eq!(
            program.exercise_status("bench"),
            ExerciseProgressionStatus::Disabled
        );

        // Re-enabling starts from scratch.
        program.set_progression_enabled("bench", true);
        assert!(program.progression_state("bench").is_none());
        assert_eq!(program.effective_policy("bench"), ProgressionPolicy::Moderate);
    }

    #[test]
    fn test_override_requires_enabled_exercise() {
        let mut program = Program::new("ppl", "Push Pull Legs");
        assert!(!program.set_progression_override("squat", ProgressionPolicy::Conservative));
        assert!(program.exercise_progression_overrides.is_empty());
        assert!(program.is_consistent());
    }

    #[test]
    fn test_state_requires_enabled_exercise() {
        let mut program = Program::new("ppl", "Push Pull Legs");
        assert!(!program.set_progression_state("squat", sample_state(), DEFAULT_HISTORY_CAP));
        assert!(program.exercise_progression_states.is_empty());
        assert!(program.is_consistent());
    }

    #[test]
    fn test_effective_policy_prefers_override() {
        let mut program =
            program_with("bench").with_policy(ProgressionPolicy::Conservative);
        assert_eq!(
            program.effective_policy("bench"),
            ProgressionPolicy::Conservative
        );

        program.set_progression_override("bench", ProgressionPolicy::Adaptive);
        assert_eq!(program.effective_policy("bench"), ProgressionPolicy::Adaptive);

        assert!(program.clear_progression_override("bench"));
        assert!(!program.clear_progression_override("bench"));
        assert_eq!(
            program.effective_policy("bench"),
            ProgressionPolicy::Conservative
        );
    }

    #[test]
    fn test_set_state_is_idempotent() {
        let mut program = program_with("bench");
        let state = sample_state();
        program.set_progression_state("bench", state.clone(), DEFAULT_HISTORY_CAP);
        let once = program.clone();

        program.set_progression_state("bench", state, DEFAULT_HISTORY_CAP);
        assert_eq!(program, once);
    }

    #[test]
    fn test_set_state_normalizes() {
        let mut program = program_with("bench");
        let mut state = sample_state();
        state.confidence = 1.7;
        state.fail_streak = 1;
        state.recent_outcomes = vec![ProgressionOutcome::Regress; 9];

        program.set_progression_state("bench", state, DEFAULT_HISTORY_CAP);
        let stored = program.progression_state("bench").unwrap();
        assert_eq!(stored.confidence, 1.0);
        assert_eq!(stored.recent_outcomes.len(), DEFAULT_HISTORY_CAP);
        assert_eq!(stored.success_streak, 0);
        assert_eq!(stored.fail_streak, 0);
        assert!(stored.is_consistent(DEFAULT_HISTORY_CAP));
    }

    #[test]
    fn test_global_switch_keeps_exercise_flags() {
        let mut program = program_with("bench");
        program.set_program_progression(false);

        // Editing while globally off is preserved.
        program.set_progression_enabled("squat", true);
        assert!(program.set_progression_override("squat", ProgressionPolicy::Adaptive));
        assert!(program.is_exercise_enabled("bench"));
        assert!(program.is_exercise_enabled("squat"));

        // But nothing is active until the switch is back on.
        assert!(!program.is_progression_active("bench"));
        program.set_program_progression(true);
        assert!(program.is_progression_active("bench"));
        assert!(program.is_progression_active("squat"));
    }

    #[test]
    fn test_state_roundtrip_is_lossless() {
        let mut program = program_with("bench");
        program.set_progression_state("bench", sample_state(), DEFAULT_HISTORY_CAP);

        let json = serde_json::to_string_pretty(&program).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();

        let state = back.progression_state("bench").unwrap();
        assert_eq!(state.last_prescribed_weight, Some(135.0));
        assert_eq!(state.last_prescribed_reps, Some(8));
        assert_eq!(state.success_streak, 2);
        assert_eq!(state.fail_streak, 0);
        assert_eq!(
            state.recent_outcomes,
            vec![ProgressionOutcome::Progress, ProgressionOutcome::Stay]
        );
        assert_eq!(state.confidence, 0.8);
        assert_eq!(back, program);
    }

    #[test]
    fn test_unknown_policy_tags_decode_to_moderate() {
        let json = r#"{
            "id": "ppl",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
            "progression_enabled": true,
            "progression_policy": "reckless",
            "progression_enabled_exercises": ["bench"],
            "exercise_progression_overrides": {"bench": 3}
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.progression_policy, ProgressionPolicy::Moderate);
        assert_eq!(program.effective_policy("bench"), ProgressionPolicy::Moderate);
        assert!(program.exercise_progression_states.is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Enable(usize),
            Disable(usize),
            Override(usize, ProgressionPolicy),
            ClearOverride(usize),
            SetState(usize),
            Toggle(bool),
        }

        const IDS: [&str; 3] = ["bench", "squat", "row"];

        fn policy_strategy() -> impl Strategy<Value = ProgressionPolicy> {
            prop_oneof![
                Just(ProgressionPolicy::Conservative),
                Just(ProgressionPolicy::Moderate),
                Just(ProgressionPolicy::Adaptive),
            ]
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..IDS.len()).prop_map(Op::Enable),
                (0..IDS.len()).prop_map(Op::Disable),
                (0..IDS.len(), policy_strategy()).prop_map(|(i, p)| Op::Override(i, p)),
                (0..IDS.len()).prop_map(Op::ClearOverride),
                (0..IDS.len()).prop_map(Op::SetState),
                any::<bool>().prop_map(Op::Toggle),
            ]
        }

        proptest! {
            #[test]
            fn program_stays_consistent(ops in prop::collection::vec(op_strategy(), 0..40)) {
                let mut program = Program::new("p", "P");
                for op in ops {
                    match op {
                        Op::Enable(i) => program.set_progression_enabled(IDS[i], true),
                        Op::Disable(i) => program.set_progression_enabled(IDS[i], false),
                        Op::Override(i, p) => {
                            program.set_progression_override(IDS[i], p);
                        }
                        Op::ClearOverride(i) => {
                            program.clear_progression_override(IDS[i]);
                        }
                        Op::SetState(i) => {
                            program.set_progression_state(IDS[i], sample_state(), DEFAULT_HISTORY_CAP);
                        }
                        Op::Toggle(on) => program.set_program_progression(on),
                    }
                    prop_assert!(program.is_consistent());
                }
            }
        }
    }
}
