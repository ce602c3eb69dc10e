//! Next-session prescription.
//!
//! Decision order, evaluated on the state produced by the updater:
//! 1. Nothing prescribed yet -> seed from the exercise's default scheme
//! 2. Success streak at threshold and confidence at or above the floor -> increase
//! 3. Fail streak at threshold -> decrease (deload)
//! 4. Otherwise -> carry the last prescription forward
//!
//! The streak that triggered a change is reset to zero when the change is
//! issued, so the next change needs a fresh run of outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::policy::PolicyRules;
use crate::core::state::ExerciseProgressionState;

const WEIGHT_EPSILON: f64 = 1e-9;

/// What an exercise progresses on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionMode {
    /// Load goes up and down; reps stay fixed.
    #[default]
    Weight,
    /// Reps go up and down; load stays fixed (bodyweight work).
    Reps,
}

/// An exercise's configured default set scheme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetScheme {
    /// Number of working sets.
    #[serde(default = "default_sets")]
    pub sets: u32,
    /// Reps per working set.
    pub reps: u32,
    /// Starting load, absent for bodyweight exercises.
    #[serde(default)]
    pub weight: Option<f64>,
}

fn default_sets() -> u32 {
    3
}

impl SetScheme {
    /// Create a scheme.
    pub fn new(sets: u32, reps: u32, weight: Option<f64>) -> Self {
        Self { sets, reps, weight }
    }
}

/// Defaults supplied by the exercise catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExerciseDefaults {
    /// Scheme used to seed the first prescription.
    pub scheme: SetScheme,
    /// What the exercise progresses on.
    #[serde(default)]
    pub mode: ProgressionMode,
}

impl ExerciseDefaults {
    /// Weight-progressed defaults.
    pub fn weighted(sets: u32, reps: u32, weight: f64) -> Self {
        Self {
            scheme: SetScheme::new(sets, reps, Some(weight)),
            mode: ProgressionMode::Weight,
        }
    }

    /// Rep-progressed defaults with no load.
    pub fn bodyweight(sets: u32, reps: u32) -> Self {
        Self {
            scheme: SetScheme::new(sets, reps, None),
            mode: ProgressionMode::Reps,
        }
    }
}

/// Tunables the prescriber needs beyond the policy row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrescriberSettings {
    /// Minimum confidence before an increase may be issued.
    pub confidence_floor: f64,
    /// Loads are rounded to multiples of this; 0 disables rounding.
    pub weight_rounding: f64,
}

impl Default for PrescriberSettings {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            weight_rounding: 2.5,
        }
    }
}

/// Why a prescription has the values it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionDecision {
    /// First prescription, taken from the default scheme.
    Seeded,
    /// Load or reps went up.
    Increase,
    /// Load or reps went down.
    Decrease,
    /// Last prescription carried forward.
    Hold,
}

impl PrescriptionDecision {
    /// Get the display name for this decision.
    pub fn display_name(&self) -> &'static str {
        match self {
            PrescriptionDecision::Seeded => "seeded",
            PrescriptionDecision::Increase => "increase",
            PrescriptionDecision::Decrease => "decrease",
            PrescriptionDecision::Hold => "hold",
        }
    }
}

impl std::fmt::Display for PrescriptionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.display_name())
    }
}

/// Target for the next session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    /// Working sets, taken from the exercise's scheme.
    #[serde(default = "default_sets")]
    pub sets: u32,
    /// Load per set.
    pub weight: Option<f64>,
    /// Reps per set.
    pub reps: Option<u32>,
    /// How the values were reached.
    pub decision: PrescriptionDecision,
}

impl Prescription {
    /// The first prescription for an exercise.
    pub fn seed(defaults: &ExerciseDefaults) -> Self {
        Self {
            sets: defaults.scheme.sets,
            weight: defaults.scheme.weight,
            reps: Some(defaults.scheme.reps),
            decision: PrescriptionDecision::Seeded,
        }
    }

    /// Whether the prescription changes the load or reps.
    pub fn is_change(&self) -> bool {
        matches!(
            self.decision,
            PrescriptionDecision::Increase | PrescriptionDecision::Decrease
        )
    }
}

/// Compute the next prescription and the state that records it.
///
/// The returned state carries the new `last_prescribed_*` values and, when a
/// change was issued, the triggering streak reset to zero.
pub fn prescribe(
    state: &ExerciseProgressionState,
    rules: &PolicyRules,
    defaults: &ExerciseDefaults,
    settings: &PrescriberSettings,
    now: DateTime<Utc>,
) -> (ExerciseProgressionState, Prescription) {
    let mut next = state.clone();
    next.last_updated_at = now;

    if !state.has_prescription() {
        let prescription = Prescription::seed(defaults);
        next.last_prescribed_weight = prescription.weight;
        next.last_prescribed_reps = prescription.reps;
        return (next, prescription);
    }

    let weight = state.last_prescribed_weight;
    let reps = state.last_prescribed_reps.or(Some(defaults.scheme.reps));
    let mode = effective_mode(defaults.mode, weight);

    let wants_increase = state.success_streak >= rules.progress_threshold
        && state.confidence + WEIGHT_EPSILON >= settings.confidence_floor;
    let wants_decrease = state.fail_streak >= rules.regress_threshold;

    let mut prescription = Prescription {
        sets: defaults.scheme.sets,
        weight,
        reps,
        decision: PrescriptionDecision::Hold,
    };

    if wants_increase {
        match (mode, weight) {
            (ProgressionMode::Weight, Some(current)) => {
                prescription.weight = Some(increase_weight(current, rules, settings));
            }
            _ => {
                prescription.reps = reps.map(|r| r.saturating_add(rules.rep_increment));
            }
        }
        prescription.decision = PrescriptionDecision::Increase;
        next.success_streak = 0;
    } else if wants_decrease {
        let lowered = match (mode, weight) {
            (ProgressionMode::Weight, Some(current)) => {
                let target = decrease_weight(current, rules, settings);
                (target + WEIGHT_EPSILON < current).then_some((Some(target), reps))
            }
            _ => reps
                .map(|r| r.saturating_sub(rules.rep_increment).max(1))
                .filter(|&lower| Some(lower) != reps)
                .map(|lower| (weight, Some(lower))),
        };

        match lowered {
            Some((lower_weight, lower_reps)) => {
                prescription.weight = lower_weight;
                prescription.reps = lower_reps;
                prescription.decision = PrescriptionDecision::Decrease;
                next.fail_streak = 0;
            }
            None => tracing::debug!("already at the floor, holding instead of deloading"),
        }
    }

    next.last_prescribed_weight = prescription.weight;
    next.last_prescribed_reps = prescription.reps;

    tracing::debug!(
        decision = %prescription.decision,
        weight = ?prescription.weight,
        reps = ?prescription.reps,
        "prescribed next target"
    );

    (next, prescription)
}

/// Weight mode only applies when there is a load to change.
fn effective_mode(mode: ProgressionMode, weight: Option<f64>) -> ProgressionMode {
    match (mode, weight) {
        (ProgressionMode::Weight, Some(_)) => ProgressionMode::Weight,
        _ => ProgressionMode::Reps,
    }
}

fn round_to(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !step.is_finite() {
        return value;
    }
    (value / step).round() * step
}

/// Increase is always strictly above `current`.
fn increase_weight(current: f64, rules: &PolicyRules, settings: &PrescriberSettings) -> f64 {
    let step = settings.weight_rounding;
    let raw = current + rules.weight_increment.amount(current);
    let rounded = round_to(raw, step);
    if rounded > current + WEIGHT_EPSILON {
        return rounded;
    }
    if step > 0.0 && step.is_finite() {
        ((current / step).floor() + 1.0) * step
    } else {
        raw
    }
}

/// Decrease is strictly below `current` unless `current` is already 0.
fn decrease_weight(current: f64, rules: &PolicyRules, settings: &PrescriberSettings) -> f64 {
    let step = settings.weight_rounding;
    let raw = current - rules.weight_decrement.amount(current);
    let mut rounded = round_to(raw, step);
    if rounded + WEIGHT_EPSILON >= current && step > 0.0 && step.is_finite() {
        rounded = ((current / step).ceil() - 1.0) * step;
    }
    rounded.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{ProgressionPolicy, WeightAdjustment};

    fn state_at(weight: f64, reps: u32) -> ExerciseProgressionState {
        ExerciseProgressionState::new(0.0, Utc::now()).with_prescription(Some(weight), Some(reps))
    }

    fn bench() -> ExerciseDefaults {
        ExerciseDefaults::weighted(3, 8, 95.0)
    }

    #[test]
    fn test_seed_from_defaults() {
        let state = ExerciseProgressionState::new(0.0, Utc::now());
        let (next, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &bench(),
            &PrescriberSettings::default(),
            Utc::now(),
        );

        assert_eq!(prescription.decision, PrescriptionDecision::Seeded);
        assert_eq!(prescription.sets, 3);
        assert_eq!(prescription.weight, Some(95.0));
        assert_eq!(prescription.reps, Some(8));
        assert_eq!(next.last_prescribed_weight, Some(95.0));
        assert_eq!(next.last_prescribed_reps, Some(8));
    }

    #[test]
    fn test_set_count_follows_scheme() {
        let defaults = ExerciseDefaults::weighted(5, 5, 185.0);
        let mut state = state_at(185.0, 5);
        state.success_streak = 2;
        state.confidence = 0.7;

        let (_, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &defaults,
            &PrescriberSettings::default(),
            Utc::now(),
        );
        assert_eq!(prescription.decision, PrescriptionDecision::Increase);
        assert_eq!(prescription.sets, 5);

        let legacy: Prescription =
            serde_json::from_str(r#"{"weight": 135.0, "reps": 8, "decision": "hold"}"#).unwrap();
        assert_eq!(legacy.sets, 3);
    }

    #[test]
    fn test_increase_when_streak_and_confidence_allow() {
        let mut state = state_at(135.0, 8);
        state.success_streak = 3;
        state.confidence = 0.84;

        let (next, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &bench(),
            &PrescriberSettings::default(),
            Utc::now(),
        );

        assert_eq!(prescription.decision, PrescriptionDecision::Increase);
        assert_eq!(prescription.weight, Some(140.0));
        assert_eq!(prescription.reps, Some(8));
        assert_eq!(next.success_streak, 0);
        assert_eq!(next.last_prescribed_weight, Some(140.0));
    }

    #[test]
    fn test_low_confidence_blocks_increase() {
        let mut state = state_at(135.0, 8);
        state.success_streak = 2;
        state.confidence = 0.36;

        let (next, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &bench(),
            &PrescriberSettings::default(),
            Utc::now(),
        );

        assert_eq!(prescription.decision, PrescriptionDecision::Hold);
        assert_eq!(prescription.weight, Some(135.0));
        assert_eq!(next.success_streak, 2);
    }

    #[test]
    fn test_streak_below_threshold_holds() {
        let mut state = state_at(135.0, 8);
        state.success_streak = 2;
        state.confidence = 0.9;

        let (_, prescription) = prescribe(
            &state,
            &PolicyRules::CONSERVATIVE,
            &bench(),
            &PrescriberSettings::default(),
            Utc::now(),
        );

        assert_eq!(prescription.decision, PrescriptionDecision::Hold);
        assert_eq!(prescription.weight, Some(135.0));
    }

    #[test]
    fn test_decrease_on_fail_streak() {
        let mut state = state_at(135.0, 8);
        state.fail_streak = 2;
        state.confidence = 0.2;

        let (next, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &bench(),
            &PrescriberSettings::default(),
            Utc::now(),
        );

        // 135 - 10% = 121.5, rounded to 122.5
        assert_eq!(prescription.decision, PrescriptionDecision::Decrease);
        assert_eq!(prescription.weight, Some(122.5));
        assert_eq!(next.fail_streak, 0);
    }

    #[test]
    fn test_rounding_disabled() {
        let mut state = state_at(135.0, 8);
        state.fail_streak = 2;

        let settings = PrescriberSettings {
            weight_rounding: 0.0,
            ..Default::default()
        };
        let (_, prescription) =
            prescribe(&state, &PolicyRules::MODERATE, &bench(), &settings, Utc::now());

        assert!((prescription.weight.unwrap() - 121.5).abs() < 1e-9);
    }

    #[test]
    fn test_increase_is_strictly_above_even_with_coarse_rounding() {
        let mut state = state_at(100.0, 5);
        state.success_streak = 1;
        state.confidence = 1.0;

        let mut rules = PolicyRules::ADAPTIVE;
        rules.weight_increment = WeightAdjustment::Absolute(1.0);
        let settings = PrescriberSettings {
            weight_rounding: 5.0,
            ..Default::default()
        };

        let (_, prescription) = prescribe(&state, &rules, &bench(), &settings, Utc::now());
        assert_eq!(prescription.weight, Some(105.0));
    }

    #[test]
    fn test_decrease_never_goes_negative() {
        let mut state = state_at(2.5, 8);
        state.fail_streak = 1;

        let mut rules = PolicyRules::ADAPTIVE;
        rules.weight_decrement = WeightAdjustment::Absolute(10.0);

        let (_, prescription) = prescribe(
            &state,
            &rules,
            &bench(),
            &PrescriberSettings::default(),
            Utc::now(),
        );
        assert_eq!(prescription.weight, Some(0.0));
        assert_eq!(prescription.decision, PrescriptionDecision::Decrease);
    }

    #[test]
    fn test_decrease_at_zero_holds() {
        let mut state = state_at(0.0, 8);
        state.fail_streak = 3;

        let (next, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &bench(),
            &PrescriberSettings::default(),
            Utc::now(),
        );
        assert_eq!(prescription.decision, PrescriptionDecision::Hold);
        assert_eq!(next.fail_streak, 3);
    }

    #[test]
    fn test_bodyweight_exercise_progresses_reps() {
        let defaults = ExerciseDefaults::bodyweight(3, 10);
        let mut state =
            ExerciseProgressionState::new(0.0, Utc::now()).with_prescription(None, Some(10));
        state.success_streak = 1;
        state.confidence = 0.6;

        let (_, prescription) = prescribe(
            &state,
            &ProgressionPolicy::Adaptive.rules(),
            &defaults,
            &PrescriberSettings::default(),
            Utc::now(),
        );

        assert_eq!(prescription.decision, PrescriptionDecision::Increase);
        assert_eq!(prescription.reps, Some(12));
        assert_eq!(prescription.weight, None);
    }

    #[test]
    fn test_rep_mode_with_load_keeps_load() {
        let defaults = ExerciseDefaults {
            scheme: SetScheme::new(3, 12, Some(20.0)),
            mode: ProgressionMode::Reps,
        };
        let mut state = state_at(20.0, 12);
        state.fail_streak = 2;

        let (_, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &defaults,
            &PrescriberSettings::default(),
            Utc::now(),
        );

        assert_eq!(prescription.decision, PrescriptionDecision::Decrease);
        assert_eq!(prescription.reps, Some(11));
        assert_eq!(prescription.weight, Some(20.0));
    }

    #[test]
    fn test_rep_decrease_floors_at_one() {
        let defaults = ExerciseDefaults::bodyweight(3, 1);
        let mut state =
            ExerciseProgressionState::new(0.0, Utc::now()).with_prescription(None, Some(1));
        state.fail_streak = 2;

        let (_, prescription) = prescribe(
            &state,
            &PolicyRules::MODERATE,
            &defaults,
            &PrescriberSettings::default(),
            Utc::now(),
        );
        assert_eq!(prescription.reps, Some(1));
        assert_eq!(prescription.decision, PrescriptionDecision::Hold);
    }

    #[test]
    fn test_decision_serializes_snake_case() {
        let json = serde_json::to_string(&PrescriptionDecision::Increase).unwrap();
        assert_eq!(json, "\"increase\"");
    }

    #[test]
    fn test_defaults_deserialize_with_default_mode() {
        let json = r#"{"scheme": {"reps": 5, "weight": 225.0}}"#;
        let defaults: ExerciseDefaults = serde_json::from_str(json).unwrap();
        assert_eq!(defaults.mode, ProgressionMode::Weight);
        assert_eq!(defaults.scheme.sets, 3);
    }
}
