// Common error types for sgrep-lint

use std::path::PathBuf;

use crate::utils::constants::PLEASE_FILE_ISSUE_TEXT;

/// Exit code for a run that found matches while `--error` was given.
pub const FINDINGS_EXIT_CODE: i32 = 1;
/// Exit code for every failure that stops a run.
pub const FATAL_EXIT_CODE: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A config location given on the command line does not exist.
    #[error("unable to find a config; path `{}` does not exist{hint}", .path.display())]
    ConfigNotFound { path: PathBuf, hint: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The matching engine could not be started or produced unusable output.
    #[error("sgrep engine error: {0}")]
    EngineError(String),

    #[error("Step '{step}' failed with exit code {exit_code}")]
    ExecutionError { step: String, exit_code: i32 },

    #[error("sgrep encountered an error: {0}; this is not your fault. {}", PLEASE_FILE_ISSUE_TEXT)]
    Internal(String),
}

impl From<reqwest::Error> for LintError {
    fn from(err: reqwest::Error) -> Self {
        LintError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for LintError {
    fn from(err: serde_json::Error) -> Self {
        LintError::Internal(format!("JSON serialization failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, LintError>;

/// An error ready to be shown to the person running the CLI.
#[derive(Debug)]
pub struct UserError {
    pub message: String,
    pub exit_code: i32,
}

impl UserError {
    pub fn from_lint_error(err: &LintError) -> Self {
        Self {
            message: err.to_string(),
            exit_code: FATAL_EXIT_CODE,
        }
    }

    pub fn print(&self) {
        eprintln!("error: {}", self.message);
    }
}
