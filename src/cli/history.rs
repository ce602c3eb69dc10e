//! History command for Overload.
//!
//! Shows recorded progression events, newest last.

use serde::{Deserialize, Serialize};

use crate::history::{HistoryLogger, ProgressionEvent, ProgressionEventType};

/// Options for the history command.
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Only events for this program.
    pub program: Option<String>,
    /// Only events for this exercise.
    pub exercise: Option<String>,
    /// Keep only the most recent N events.
    pub limit: Option<usize>,
}

/// Output format for the history command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Matching events, oldest first.
    pub events: Vec<ProgressionEvent>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryOutput {
    /// Create a successful output.
    pub fn success(events: Vec<ProgressionEvent>) -> Self {
        Self {
            success: true,
            events,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            events: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The history command implementation.
pub struct HistoryCommand {
    logger: HistoryLogger,
}

impl HistoryCommand {
    /// Create a new history command.
    pub fn new(logger: HistoryLogger) -> Self {
        Self { logger }
    }

    /// Run the history command.
    pub fn run(&self, options: &HistoryOptions) -> HistoryOutput {
        let read = match (&options.program, &options.exercise) {
            (Some(program), exercise) => self.logger.read_for_program(program, exercise.as_deref()),
            (None, Some(exercise)) => self.logger.read_for_exercise(exercise),
            (None, None) => self.logger.read_all(),
        };

        let mut events = match read {
            Ok(events) => events,
            Err(e) => return HistoryOutput::failure(format!("Failed to read history: {}", e)),
        };

        if let Some(limit) = options.limit {
            let skip = events.len().saturating_sub(limit);
            events.drain(..skip);
        }

        HistoryOutput::success(events)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &HistoryOutput, options: &HistoryOptions) -> String {
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
    fn format_human_readable(&self, output: &HistoryOutput) -> String {
        if !output.success {
            return format!(
                "History failed: {}",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if output.events.is_empty() {
            return "No progression events recorded.".to_string();
        }

        output
            .events
            .iter()
            .map(|event| {
                format!(
                    "{}  {:<16} {:<14} {:<12} {}",
                    event.ts.format("%Y-%m-%d %H:%M"),
                    event.program_id,
                    event.data.exercise_id(),
                    event.data.event_name(),
                    describe(&event.data)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn describe(data: &ProgressionEventType) -> String {
    match data {
        ProgressionEventType::Evaluated {
            outcome,
            confidence,
            weight,
            reps,
            decision,
            ..
        } => format!(
            "{} -> {} {} (confidence {:.2})",
            outcome,
            decision,
            target(*weight, *reps),
            confidence
        ),
        ProgressionEventType::Seeded { weight, reps, .. } => target(*weight, *reps),
        ProgressionEventType::OverrideSet { policy, .. } => match policy {
            Some(policy) => policy.to_string(),
            None => "cleared".to_string(),
        },
        ProgressionEventType::Enabled { .. } | ProgressionEventType::Disabled { .. } => {
            String::new()
        }
    }
}

fn target(weight: Option<f64>, reps: Option<u32>) -> String {
    match (weight, reps) {
        (Some(w), Some(r)) => format!("{} x {}", w, r),
        (Some(w), None) => format!("{}", w),
        (None, Some(r)) => format!("{} reps", r),
        (None, None) => "-".to_string(),
    }
}
