//! Progression policies and the policy table.
//!
//! A policy is a named bundle of thresholds and increment sizes. The table is
//! pure data: [`PolicyRules::for_policy`] has no side effects and always
//! returns the same row for the same policy.

use crate::core::tag::{stored_tag_impls, StoredTag};

/// How aggressively an exercise is progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ProgressionPolicy {
    /// Slow to increase, small increments.
    Conservative,
    /// The program default.
    #[default]
    Moderate,
    /// Reacts to every session.
    Adaptive,
}

impl ProgressionPolicy {
    /// Get all policy variants.
    pub fn all() -> &'static [ProgressionPolicy] {
        &[
            ProgressionPolicy::Conservative,
            ProgressionPolicy::Moderate,
            ProgressionPolicy::Adaptive,
        ]
    }

    /// The rules row for this policy.
    pub fn rules(&self) -> PolicyRules {
        PolicyRules::for_policy(*self)
    }
}

impl StoredTag for ProgressionPolicy {
    /// Unknown or legacy policy tags decode to the program default.
    const FALLBACK: Self = ProgressionPolicy::Moderate;
    const KIND: &'static str = "progression policy";

    fn as_tag(&self) -> &'static str {
        match self {
            ProgressionPolicy::Conservative => "conservative",
            ProgressionPolicy::Moderate => "moderate",
            ProgressionPolicy::Adaptive => "adaptive",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "conservative" => Some(ProgressionPolicy::Conservative),
            "moderate" => Some(ProgressionPolicy::Moderate),
            "adaptive" => Some(ProgressionPolicy::Adaptive),
            _ => None,
        }
    }
}

stored_tag_impls!(ProgressionPolicy);

/// A load change applied on an increase or decrease decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightAdjustment {
    /// Fixed amount in the program's weight unit.
    Absolute(f64),
    /// Percentage of the current weight.
    Percent(f64),
}

impl WeightAdjustment {
    /// Size of the change for a given current weight (always non-negative).
    pub fn amount(&self, current: f64) -> f64 {
        match *self {
            WeightAdjustment::Absolute(amount) => amount,
            WeightAdjustment::Percent(pct) => current * pct / 100.0,
        }
    }

    fn is_valid(&self) -> bool {
        let raw = match *self {
            WeightAdjustment::Absolute(v) | WeightAdjustment::Percent(v) => v,
        };
        raw.is_finite() && raw > 0.0
    }
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyRules {
    /// Success streak required before an increase is issued.
    pub progress_threshold: u32,
    /// Fail streak required before a decrease is issued.
    pub regress_threshold: u32,
    /// Fraction of the remaining distance confidence moves per outcome.
    pub confidence_step: f64,
    /// Load added on an increase.
    pub weight_increment: WeightAdjustment,
    /// Load removed on a decrease (deload).
    pub weight_decrement: WeightAdjustment,
    /// Reps added or removed for rep-progressed exercises.
    pub rep_increment: u32,
}

impl PolicyRules {
    /// Adaptive: reacts after a single outcome in either direction.
    pub const ADAPTIVE: PolicyRules = PolicyRules {
        progress_threshold: 1,
        regress_threshold: 1,
        confidence_step: 0.30,
        weight_increment: WeightAdjustment::Absolute(5.0),
        weight_decrement: WeightAdjustment::Percent(10.0),
        rep_increment: 2,
    };

    /// Moderate: two consecutive outcomes before a change.
    pub const MODERATE: PolicyRules = PolicyRules {
        progress_threshold: 2,
        regress_threshold: 2,
        confidence_step: 0.20,
        weight_increment: WeightAdjustment::Absolute(5.0),
        weight_decrement: WeightAdjustment::Percent(10.0),
        rep_increment: 1,
    };

    /// Conservative: three successes to increase, small jumps.
    pub const CONSERVATIVE: PolicyRules = PolicyRules {
        progress_threshold: 3,
        regress_threshold: 2,
        confidence_step: 0.10,
        weight_increment: WeightAdjustment::Absolute(2.5),
        weight_decrement: WeightAdjustment::Percent(5.0),
        rep_increment: 1,
    };

    /// Look up the row for a policy.
    pub fn for_policy(policy: ProgressionPolicy) -> PolicyRules {
        match policy {
            ProgressionPolicy::Adaptive => Self::ADAPTIVE,
            ProgressionPolicy::Moderate => Self::MODERATE,
            ProgressionPolicy::Conservative => Self::CONSERVATIVE,
        }
    }

    /// Check the row is usable by the engine.
    ///
    /// Thresholds must be at least 1, the confidence step must lie in (0, 1],
    /// adjustments must be positive and finite, and rep increments non-zero.
    pub fn validate(&self) -> bool {
        self.progress_threshold >= 1
            && self.regress_threshold >= 1
            && self.confidence_step.is_finite()
            && self.confidence_step > 0.0
            && self.confidence_step <= 1.0
            && self.weight_increment.is_valid()
            && self.weight_decrement.is_valid()
            && self.rep_increment >= 1
    }
}
