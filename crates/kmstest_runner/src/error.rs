//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while running an external program.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Program not available: {0}")]
    ProgramNotAvailable(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Process timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid working directory: {0}")]
    InvalidWorkdir(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
