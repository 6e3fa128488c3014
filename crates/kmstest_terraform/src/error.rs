//! Error types for terraform operations.

use thiserror::Error;

/// Result type alias for terraform operations.
pub type TerraformResult<T> = Result<T, TerraformError>;

/// Errors that can occur while driving terraform.
#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("Terraform not available: {0}")]
    TerraformNotAvailable(String),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("terraform {command} exited with code {exit_code}: {output}")]
    CommandFailed {
        command: String,
        exit_code: i64,
        output: String,
    },

    #[error("{command} still failing after {attempts} attempts ({reason}): {output}")]
    RetriesExhausted {
        command: String,
        attempts: u32,
        reason: String,
        output: String,
    },

    #[error("Invalid variable {name}: {message}")]
    InvalidVariable { name: String, message: String },

    #[error("Scenario file error: {0}")]
    ScenarioFile(String),

    #[error("Runner error: {0}")]
    Runner(#[from] kmstest_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TerraformError {
    /// Output text the retry table is matched against.
    ///
    /// Only command failures carry terraform output; everything else is
    /// matched on its display form.
    pub fn retry_text(&self) -> String {
        match self {
            Self::CommandFailed { output, .. } => output.clone(),
            other => other.to_string(),
        }
    }
}
