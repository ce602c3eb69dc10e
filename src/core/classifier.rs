//! Outcome classification for a finished exercise.
//!
//! Compares the working sets recorded in a session against the target that
//! was prescribed for them:
//! 1. Skipped exercise, or no completed working set -> no outcome
//! 2. No prescribed target on record -> no outcome
//! 3. Every working set met the target -> `progress`
//! 4. No working set met the target -> `regress`
//! 5. Anything in between -> `stay`

use serde::{Deserialize, Serialize};

use crate::core::outcome::ProgressionOutcome;
use crate::core::state::ExerciseProgressionState;

/// Tolerance for comparing recorded loads and distances against targets.
const MEASURE_EPSILON: f64 = 1e-6;

/// The target issued for an exercise's working sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrescribedTarget {
    /// Target load per set.
    pub weight: Option<f64>,
    /// Target reps per set.
    pub reps: Option<u32>,
    /// Target duration per set for timed exercises.
    pub duration_seconds: Option<u32>,
    /// Target distance per set for distance-based exercises.
    pub distance_meters: Option<f64>,
}

impl PrescribedTarget {
    /// A plain weight x reps target.
    pub fn new(weight: Option<f64>, reps: Option<u32>) -> Self {
        Self {
            weight,
            reps,
            ..Default::default()
        }
    }

    /// Build the target from the last prescription stored in state.
    ///
    /// Returns `None` when nothing has been prescribed yet.
    pub fn from_state(state: &ExerciseProgressionState) -> Option<Self> {
        if !state.has_prescription() {
            return None;
        }
        Some(Self::new(state.last_prescribed_weight, state.last_prescribed_reps))
    }

    /// Add a duration target.
    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Add a distance target.
    pub fn with_distance(mut self, meters: f64) -> Self {
        self.distance_meters = Some(meters);
        self
    }

    /// Whether any dimension is actually targeted.
    pub fn is_empty(&self) -> bool {
        self.weight.is_none()
            && self.reps.is_none()
            && self.duration_seconds.is_none()
            && self.distance_meters.is_none()
    }

    /// Check whether a single recorded set meets this target.
    ///
    /// A set without a recorded weight is taken as performed at the
    /// prescribed load. Missing reps, duration or distance on a set that is
    /// targeted on that dimension count as a miss.
    pub fn is_met_by(&self, set: &SetRecord) -> bool {
        if let Some(target_reps) = self.reps {
            match set.reps {
                Some(reps) if reps >= target_reps => {}
                _ => return false,
            }
        }

        if let (Some(target_weight), Some(weight)) = (self.weight, set.weight) {
            if weight + MEASURE_EPSILON < target_weight {
                return false;
            }
        }

        if let Some(target_duration) = self.duration_seconds {
            match set.duration_seconds {
                Some(duration) if duration >= target_duration => {}
                _ => return false,
            }
        }

        if let Some(target_distance) = self.distance_meters {
            match set.distance_meters {
                Some(distance) if distance + MEASURE_EPSILON >= target_distance => {}
                _ => return false,
            }
        }

        true
    }
}

/// A single recorded set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetRecord {
    /// Load used, if tracked.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Reps performed.
    #[serde(default)]
    pub reps: Option<u32>,
    /// Time under work, for timed sets.
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    /// Distance covered, for distance sets.
    #[serde(default)]
    pub distance_meters: Option<f64>,
    /// Whether the set was marked complete.
    #[serde(default = "default_completed")]
    pub completed: bool,
    /// Warm-up sets are never compared against the target.
    #[serde(default)]
    pub warmup: bool,
}

fn default_completed() -> bool {
    true
}

impl SetRecord {
    /// A completed working set of `reps` at `weight`.
    pub fn new(weight: Option<f64>, reps: u32) -> Self {
        Self {
            weight,
            reps: Some(reps),
            duration_seconds: None,
            distance_meters: None,
            completed: true,
            warmup: false,
        }
    }

    /// A completed timed working set.
    pub fn timed(seconds: u32) -> Self {
        Self {
            weight: None,
            reps: None,
            duration_seconds: Some(seconds),
            distance_meters: None,
            completed: true,
            warmup: false,
        }
    }

    /// Mark the set as not completed.
    pub fn incomplete(mut self) -> Self {
        self.completed = false;
        self
    }

    /// Mark the set as a warm-up.
    pub fn as_warmup(mut self) -> Self {
        self.warmup = true;
        self
    }
}

/// Everything recorded for one exercise in the session just finished.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionExerciseData {
    /// The exercise was skipped entirely.
    pub skipped: bool,
    /// Recorded sets in performance order.
    pub sets: Vec<SetRecord>,
}

impl SessionExerciseData {
    /// Session data with the given sets.
    pub fn with_sets(sets: Vec<SetRecord>) -> Self {
        Self {
            skipped: false,
            sets,
        }
    }

    /// A skipped exercise.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            sets: Vec::new(),
        }
    }

    /// Working (non warm-up) sets.
    pub fn working_sets(&self) -> impl Iterator<Item = &SetRecord> {
        self.sets.iter().filter(|s| !s.warmup)
    }

    /// Whether there is anything to evaluate.
    ///
    /// False when the exercise was skipped or no working set was completed.
    pub fn has_completed_work(&self) -> bool {
        !self.skipped && self.working_sets().any(|s| s.completed)
    }
}

/// Classify a finished exercise against its prescribed target.
///
/// Returns `None` when there is nothing to evaluate: the exercise was skipped,
/// no working set was completed, or no target was ever prescribed. The caller
/// must leave progression state untouched in that case.
pub fn classify(
    target: Option<&PrescribedTarget>,
    session: &SessionExerciseData,
) -> Option<ProgressionOutcome> {
    let target = target.filter(|t| !t.is_empty())?;

    if !session.has_completed_work() {
        return None;
    }

    let mut met = 0usize;
    let mut total = 0usize;
    for set in session.working_sets() {
        total += 1;
        if set.completed && target.is_met_by(set) {
            met += 1;
        }
    }

    let outcome = if met == total {
        ProgressionOutcome::Progress
    } else if met == 0 {
        ProgressionOutcome::Regress
    } else {
        ProgressionOutcome::Stay
    };

    tracing::debug!(met, total, outcome = %outcome, "classified exercise");
    Some(outcome)
}
