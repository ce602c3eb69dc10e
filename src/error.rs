//! Unified error types for Overload with fail-open helpers.
//!
//! The progression engine itself never fails: it works on plain values and
//! degrades to "no outcome" when session data is missing. Errors only come
//! from the infrastructure around it (program storage, configuration, the
//! history log and CLI input). Where a caller can keep going with a safe
//! default, the [`FailOpen`] helpers log a warning and continue.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Overload operations.
#[derive(Error, Debug)]
pub enum OverloadError {
    /// I/O errors from program or history file operations.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// Program not found in storage.
    #[error("program not found: {program_id}")]
    ProgramNotFound { program_id: String },

    /// Caller-supplied input that cannot be used (bad ids, malformed stdin).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

/// A specialized Result type for Overload operations.
pub type Result<T> = std::result::Result<T, OverloadError>;

impl OverloadError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a program not found error.
    pub fn program_not_found(program_id: impl Into<String>) -> Self {
        Self::ProgramNotFound {
            program_id: program_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether the error means the requested record simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProgramNotFound { .. })
    }
}

impl From<io::Error> for OverloadError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for OverloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Log the error and return a safe default instead of propagating it.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the Overload CLI.
pub mod exit_codes {
    /// Command completed.
    pub const SUCCESS: i32 = 0;

    /// Command failed (bad input, missing program, storage failure).
    pub const ERROR: i32 = 1;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = OverloadError::storage(
            "/tmp/programs/ppl.json",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("storage error"));
        assert!(err.to_string().contains("/tmp/programs/ppl.json"));
    }

    #[test]
    fn test_serde_error_display() {
        let err = OverloadError::serde("invalid JSON");
        assert_eq!(err.to_string(), "serialization error: invalid JSON");
    }

    #[test]
    fn test_config_error_display() {
        let err = OverloadError::config("invalid TOML");
        assert_eq!(err.to_string(), "config error: invalid TOML");
    }

    #[test]
    fn test_program_not_found_display() {
        let err = OverloadError::program_not_found("ppl");
        assert_eq!(err.to_string(), "program not found: ppl");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_input_display() {
        let err = OverloadError::invalid_input("program id cannot be empty");
        assert_eq!(
            err.to_string(),
            "invalid input: program id cannot be empty"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: OverloadError = io_err.into();
        assert!(matches!(err, OverloadError::Storage { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: OverloadError = json_err.into();
        assert!(matches!(err, OverloadError::Serde { .. }));
    }

    #[test]
    fn test_fail_open_default() {
        let result: Result<Vec<String>> = Err(OverloadError::config("test"));
        let value = result.fail_open_default("test context");
        assert!(value.is_empty());
    }

    #[test]
    fn test_fail_open_with() {
        let result: Result<u32> = Err(OverloadError::serde("test"));
        let value = result.fail_open_with("test context", 5);
        assert_eq!(value, 5);
    }

    #[test]
    fn test_fail_open_success() {
        let result: Result<u32> = Ok(8);
        assert_eq!(result.fail_open_default("test context"), 8);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_codes::SUCCESS, 0);
        assert_eq!(exit_codes::ERROR, 1);
        assert_eq!(exit_codes::CRASH, 3);
    }
}
