//! Mock command runner for testing.
//!
//! Provides a scripted implementation of the [`CommandRunner`] trait so the
//! harness can be exercised without a terraform binary or cloud account.
//! Responses are queued per subcommand (`init`, `plan`, `destroy`, ...).

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::{CommandConfig, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Predefined mock response for a program execution.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 100,
        }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub program: String,
    pub subcommand: Option<String>,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

/// Mock command runner for testing.
///
/// Each subcommand has its own response queue. Responses are consumed in
/// order; the last one is sticky and answers every later call. Subcommands
/// without a script succeed with empty output.
#[derive(Clone)]
pub struct MockRunner {
    available: Arc<RwLock<bool>>,
    responses: Arc<RwLock<HashMap<String, VecDeque<MockResponse>>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Simulated runner-level failure (as a message for ExecutionFailed).
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            available: Arc::new(RwLock::new(true)),
            responses: Arc::new(RwLock::new(HashMap::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Set whether the program reports as available.
    pub fn set_available(self, available: bool) -> Self {
        *self.available.write() = available;
        self
    }

    /// Queue a response for the given subcommand.
    pub fn on(self, subcommand: impl Into<String>, response: MockResponse) -> Self {
        self.responses
            .write()
            .entry(subcommand.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Queue several responses for the given subcommand.
    pub fn on_sequence(self, subcommand: impl Into<String>, responses: Vec<MockResponse>) -> Self {
        self.responses
            .write()
            .entry(subcommand.into())
            .or_default()
            .extend(responses);
        self
    }

    /// Set a failure to simulate.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Subcommands in the order they were invoked.
    pub fn subcommands(&self) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .filter_map(|c| c.subcommand.clone())
            .collect()
    }

    /// Get calls to a specific subcommand.
    pub fn get_subcommand_calls(&self, subcommand: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.subcommand.as_deref() == Some(subcommand))
            .cloned()
            .collect()
    }

    fn record_call(&self, config: &CommandConfig) {
        self.captured_calls.write().push(CapturedCall {
            program: config.program.clone(),
            subcommand: config.subcommand().map(str::to_string),
            args: config.args.clone(),
            workdir: config.workdir.clone(),
            env: config.env.clone(),
        });
    }

    fn next_response(&self, subcommand: Option<&str>) -> MockResponse {
        let mut responses = self.responses.write();
        let queue = subcommand.and_then(|s| responses.get_mut(s));
        match queue {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| MockResponse::success("")),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| MockResponse::success("")),
            None => MockResponse::success(""),
        }
    }

    fn check_failure(&self) -> RunnerResult<()> {
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(RunnerError::ExecutionFailed(msg));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn is_available(&self, _program: &str) -> RunnerResult<bool> {
        Ok(*self.available.read())
    }

    async fn run(
        &self,
        config: &CommandConfig,
        _run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        self.record_call(config);
        self.check_failure()?;

        if !*self.available.read() {
            return Err(RunnerError::ProgramNotAvailable(config.program.clone()));
        }

        let response = self.next_response(config.subcommand());
        let started_at = Utc::now();
        let finished_at = started_at + chrono::Duration::milliseconds(response.duration_ms as i64);

        Ok(ExecutionResult {
            execution_id: format!("mock-{}", uuid::Uuid::new_v4()),
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at,
            duration_ms: response.duration_ms,
        })
    }
}
