//! Per-exercise progression state and the state updater.
//!
//! [`ExerciseProgressionState::advance`] is a pure transform of one
//! exercise's state. It never reads or writes program-level enable or
//! override data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::outcome::ProgressionOutcome;
use crate::core::policy::PolicyRules;

/// Default cap on `recent_outcomes`.
pub const DEFAULT_HISTORY_CAP: usize = 5;

/// Clamp a value into [0, 1]. Non-finite values collapse to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Progression state for a single exercise.
///
/// Every field survives a JSON round trip exactly, including absent
/// prescriptions and empty history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExerciseProgressionState {
    /// Most recent prescribed weight, absent until the first prescription.
    #[serde(default)]
    pub last_prescribed_weight: Option<f64>,
    /// Most recent prescribed reps, absent until the first prescription.
    #[serde(default)]
    pub last_prescribed_reps: Option<u32>,
    /// Consecutive `progress` outcomes since the last reset.
    #[serde(default)]
    pub success_streak: u32,
    /// Consecutive `regress` outcomes since the last reset.
    #[serde(default)]
    pub fail_streak: u32,
    /// Bounded outcome history, oldest first.
    #[serde(default)]
    pub recent_outcomes: Vec<ProgressionOutcome>,
    /// Smoothed estimate of how reliably prescriptions are met, in [0, 1].
    #[serde(default)]
    pub confidence: f64,
    /// When the state was last mutated.
    #[serde(default)]
    pub last_updated_at: DateTime<Utc>,
}

impl ExerciseProgressionState {
    /// Create an empty state with the given starting confidence.
    pub fn new(initial_confidence: f64, now: DateTime<Utc>) -> Self {
        Self {
            last_prescribed_weight: None,
            last_prescribed_reps: None,
            success_streak: 0,
            fail_streak: 0,
            recent_outcomes: Vec::new(),
            confidence: clamp_unit(initial_confidence),
            last_updated_at: now,
        }
    }

    /// Set the last prescription.
    pub fn with_prescription(mut self, weight: Option<f64>, reps: Option<u32>) -> Self {
        self.last_prescribed_weight = weight;
        self.last_prescribed_reps = reps;
        self
    }

    /// Whether a prescription has ever been issued.
    pub fn has_prescription(&self) -> bool {
        self.last_prescribed_weight.is_some() || self.last_prescribed_reps.is_some()
    }

    /// The most recent outcome, if any.
    pub fn last_outcome(&self) -> Option<ProgressionOutcome> {
        self.recent_outcomes.last().copied()
    }

    /// Apply one classified outcome.
    ///
    /// - `progress`: success streak grows, fail streak resets, confidence moves
    ///   toward 1 by `rules.confidence_step` of the remaining distance.
    /// - `regress`: the mirror image, toward 0.
    /// - `stay`: both streaks reset; confidence is left unchanged.
    ///
    /// The outcome is appended to the history, which is trimmed from the front
    /// to `history_cap` entries.
    pub fn advance(
        &self,
        outcome: ProgressionOutcome,
        rules: &PolicyRules,
        history_cap: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut next = self.clone();
        let step = rules.confidence_step;

        match outcome {
            ProgressionOutcome::Progress => {
                next.success_streak = next.success_streak.saturating_add(1);
                next.fail_streak = 0;
                next.confidence = clamp_unit(next.confidence + step * (1.0 - next.confidence));
            }
            ProgressionOutcome::Regress => {
                next.fail_streak = next.fail_streak.saturating_add(1);
                next.success_streak = 0;
                next.confidence = clamp_unit(next.confidence - step * next.confidence);
            }
            ProgressionOutcome::Stay => {
                next.success_streak = 0;
                next.fail_streak = 0;
                next.confidence = clamp_unit(next.confidence);
            }
        }

        next.recent_outcomes.push(outcome);
        trim_history(&mut next.recent_outcomes, history_cap);
        next.last_updated_at = now;
        next
    }

    /// Bring an externally supplied state back within its invariants.
    ///
    /// Confidence is clamped, history trimmed to the cap, and if both streaks
    /// are non-zero they are both reset (conflicting momentum counts as none).
    pub fn normalized(mut self, history_cap: usize) -> Self {
        self.confidence = clamp_unit(self.confidence);
        trim_history(&mut self.recent_outcomes, history_cap);
        if self.success_streak > 0 && self.fail_streak > 0 {
            tracing::warn!(
                success_streak = self.success_streak,
                fail_streak = self.fail_streak,
                "conflicting streaks in progression state, resetting both"
            );
            self.success_streak = 0;
            self.fail_streak = 0;
        }
        if let Some(weight) = self.last_prescribed_weight {
            if !weight.is_finite() || weight < 0.0 {
                self.last_prescribed_weight = Some(0.0);
            }
        }
        self
    }

    /// Check every state invariant.
    pub fn is_consistent(&self, history_cap: usize) -> bool {
        (0.0..=1.0).contains(&self.confidence)
            && self.recent_outcomes.len() <= history_cap.max(1)
            && !(self.success_streak > 0 && self.fail_streak > 0)
    }
}

fn trim_history(outcomes: &mut Vec<ProgressionOutcome>, cap: usize) {
    let cap = cap.max(1);
    if outcomes.len() > cap {
        let excess = outcomes.len() - cap;
        outcomes.drain(..excess);
    }
}
