//! Overload - adaptive progressive overload for resistance training
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use overload::cli::ExerciseAction as Action;
use overload::config::{crash_log_path, history_log_path, Config};
use overload::core::ProgressionPolicy;
use overload::error::exit_codes;
use overload::history::HistoryLogger;
use overload::storage::FileProgramStore;

// =============================================================================
// CLI Definition
// =============================================================================

/// Overload - adaptive progressive overload for resistance training
#[derive(Parser)]
#[command(name = "overload")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage training programs
    Program {
        #[command(subcommand)]
        action: ProgramAction,
        /// Output as JSON
        #[arg(long, short, global = true)]
        json: bool,
        /// Suppress output
        #[arg(long, short, global = true)]
        quiet: bool,
    },

    /// Enable progression for an exercise
    Enable {
        /// Program ID
        program_id: String,
        /// Exercise ID
        exercise_id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Disable progression for an exercise and drop its state
    Disable {
        /// Program ID
        program_id: String,
        /// Exercise ID
        exercise_id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Set or clear an exercise's policy override
    Override {
        /// Program ID
        program_id: String,
        /// Exercise ID
        exercise_id: String,
        /// Policy to use for this exercise
        #[arg(value_enum, required_unless_present = "clear")]
        policy: Option<PolicyArg>,
        /// Remove the override and fall back to the program policy
        #[arg(long, conflicts_with = "policy")]
        clear: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Evaluate a finished session (JSON stdin) and prescribe the next one
    Evaluate {
        /// Program ID
        program_id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show recorded progression events
    History {
        /// Only events for this program
        #[arg(long, short)]
        program: Option<String>,
        /// Only events for this exercise
        #[arg(long, short)]
        exercise: Option<String>,
        /// Show only the most recent N events
        #[arg(long, short)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },
}

#[derive(Subcommand)]
enum ProgramAction {
    /// Create a program
    Create {
        /// Program ID (letters, digits, '-', '_' or '.')
        id: String,
        /// Display name (defaults to the ID)
        #[arg(long, short)]
        name: Option<String>,
        /// Program-level policy (defaults to the configured policy)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Show a program and its tracked exercises
    Show {
        /// Program ID
        id: String,
    },
    /// List programs, most recently updated first
    List {
        /// Maximum number of programs
        #[arg(long, short, default_value = "20")]
        limit: usize,
    },
    /// Delete a program and its progression data
    Delete {
        /// Program ID
        id: String,
    },
    /// Turn progression on or off for a whole program
    Toggle {
        /// Program ID
        id: String,
        /// Turn progression on
        #[arg(long, conflicts_with = "off", required_unless_present = "off")]
        on: bool,
        /// Turn progression off
        #[arg(long)]
        off: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Adaptive,
    Moderate,
    Conservative,
}

impl From<PolicyArg> for ProgressionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Adaptive => ProgressionPolicy::Adaptive,
            PolicyArg::Moderate => ProgressionPolicy::Moderate,
            PolicyArg::Conservative => ProgressionPolicy::Conservative,
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    setup_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("overload error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("overload panic: {}", info);

        if let Some(crash_log) = crash_log_path() {
            if let Some(parent) = crash_log.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Log to stderr, filtered by `OVERLOAD_LOG` (default `warn`).
fn setup_tracing() {
    let filter = EnvFilter::try_from_env("OVERLOAD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Program {
            action,
            json,
            quiet,
        } => run_program(action, json, quiet),
        Commands::Enable {
            program_id,
            exercise_id,
            json,
            quiet,
        } => run_exercise(&program_id, &exercise_id, Action::Enable, json, quiet),
        Commands::Disable {
            program_id,
            exercise_id,
            json,
            quiet,
        } => run_exercise(&program_id, &exercise_id, Action::Disable, json, quiet),
        Commands::Override {
            program_id,
            exercise_id,
            policy,
            clear,
            json,
            quiet,
        } => {
            let action = match (policy, clear) {
                (Some(policy), false) => Action::Override(policy.into()),
                _ => Action::ClearOverride,
            };
            run_exercise(&program_id, &exercise_id, action, json, quiet)
        }
        Commands::Evaluate {
            program_id,
            json,
            quiet,
        } => run_evaluate(&program_id, json, quiet),
        Commands::History {
            program,
            exercise,
            limit,
            json,
            quiet,
        } => run_history(program, exercise, limit, json, quiet),
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::SUCCESS as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

/// The history logger, when history is enabled and a home directory exists.
fn history_logger(config: &Config) -> Option<HistoryLogger> {
    if !config.history.enabled {
        return None;
    }
    history_log_path().map(HistoryLogger::new)
}

fn run_program(
    action: ProgramAction,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use overload::cli::program::{ProgramCommand, ProgramOptions};

    let config = Config::load();
    let store = FileProgramStore::new()?;
    let cmd = ProgramCommand::new(store, config);
    let options = ProgramOptions { json, quiet };

    let output = match action {
        ProgramAction::Create { id, name, policy } => {
            cmd.create(&id, name.as_deref(), policy.map(Into::into))
        }
        ProgramAction::Show { id } => cmd.show(&id),
        ProgramAction::List { limit } => cmd.list(limit),
        ProgramAction::Toggle { id, on, off: _ } => cmd.toggle(&id, on),
        ProgramAction::Delete { id } => cmd.delete(&id),
    };
    let formatted = cmd.format_output(&output, &options);

    if !formatted.is_empty() {
        println!("{}", formatted);
    }

    Ok(success_to_exit_code(output.success))
}

fn run_exercise(
    program_id: &str,
    exercise_id: &str,
    action: Action,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use overload::cli::exercise::{ExerciseCommand, ExerciseOptions};

    let config = Config::load();
    let store = FileProgramStore::new()?;
    let mut cmd = ExerciseCommand::new(store);
    if let Some(history) = history_logger(&config) {
        cmd = cmd.with_history(history);
    }
    let options = ExerciseOptions { json, quiet };

    let output = cmd.run(program_id, exercise_id, action);
    let formatted = cmd.format_output(&output, &options);

    if !formatted.is_empty() {
        println!("{}", formatted);
    }

    Ok(success_to_exit_code(output.success))
}

fn run_evaluate(
    program_id: &str,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use overload::cli::evaluate::{EvaluateCommand, EvaluateOptions};

    let config = Config::load();
    let store = FileProgramStore::new()?;
    let history = history_logger(&config);
    let mut cmd = EvaluateCommand::new(store, config);
    if let Some(history) = history {
        cmd = cmd.with_history(history);
    }
    let options = EvaluateOptions { json, quiet };

    let output = cmd.run(program_id);
    let formatted = cmd.format_output(&output, &options);

    if !formatted.is_empty() {
        println!("{}", formatted);
    }

    Ok(success_to_exit_code(output.success))
}

fn run_history(
    program: Option<String>,
    exercise: Option<String>,
    limit: Option<usize>,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use overload::cli::history::{HistoryCommand, HistoryOptions};

    let path = history_log_path().ok_or("could not determine the Overload home directory")?;
    let cmd = HistoryCommand::new(HistoryLogger::new(path));
    let options = HistoryOptions {
        json,
        quiet,
        program,
        exercise,
        limit,
    };

    let output = cmd.run(&options);
    let formatted = cmd.format_output(&output, &options);

    if !formatted.is_empty() {
        println!("{}", formatted);
    }

    Ok(success_to_exit_code(output.success))
}
