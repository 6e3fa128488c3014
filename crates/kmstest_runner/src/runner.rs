//! Command runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{CommandConfig, RunConfig};
use crate::error::RunnerResult;

/// Result of a program execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Identifier for log correlation
    pub execution_id: String,
    /// Exit code from the process
    pub exit_code: i64,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs external programs on behalf of the harness.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Check if a program can be launched.
    async fn is_available(&self, program: &str) -> RunnerResult<bool>;

    /// Run a program to completion and capture its output.
    ///
    /// A non-zero exit code is not an error at this layer; callers inspect
    /// [`ExecutionResult::success`].
    async fn run(&self, config: &CommandConfig, run_config: &RunConfig)
        -> RunnerResult<ExecutionResult>;
}
