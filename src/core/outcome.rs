//! Session outcome classification result.

use crate::core::tag::{stored_tag_impls, StoredTag};

/// How a completed exercise compared with its prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressionOutcome {
    /// Every working set met the target.
    Progress,
    /// Some sets met the target and some did not.
    Stay,
    /// No working set met the target.
    Regress,
}

impl ProgressionOutcome {
    /// Get all outcome variants.
    pub fn all() -> &'static [ProgressionOutcome] {
        &[
            ProgressionOutcome::Progress,
            ProgressionOutcome::Stay,
            ProgressionOutcome::Regress,
        ]
    }

    /// Whether this outcome counts toward the success streak.
    pub fn is_success(&self) -> bool {
        matches!(self, ProgressionOutcome::Progress)
    }

    /// Whether this outcome counts toward the fail streak.
    pub fn is_failure(&self) -> bool {
        matches!(self, ProgressionOutcome::Regress)
    }
}

impl StoredTag for ProgressionOutcome {
    /// Unknown outcome tags decode to the neutral outcome.
    const FALLBACK: Self = ProgressionOutcome::Stay;
    const KIND: &'static str = "progression outcome";

    fn as_tag(&self) -> &'static str {
        match self {
            ProgressionOutcome::Progress => "progress",
            ProgressionOutcome::Stay => "stay",
            ProgressionOutcome::Regress => "regress",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "progress" => Some(ProgressionOutcome::Progress),
            "stay" => Some(ProgressionOutcome::Stay),
            "regress" => Some(ProgressionOutcome::Regress),
            _ => None,
        }
    }
}

stored_tag_impls!(ProgressionOutcome);
