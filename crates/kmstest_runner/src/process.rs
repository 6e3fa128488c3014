//! Process-based runner for local or containerized execution.
//!
//! Terraform is normally launched straight from `PATH`. When a
//! [`ContainerWrap`] is configured the same invocation is rewritten into a
//! `docker run` / `podman run` of the terraform image, with the working
//! directory bind-mounted into the container.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{CommandConfig, ContainerWrap, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Log output from a running process.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: chrono::DateTime<Utc>,
    pub stream: LogStream,
    pub message: String,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Log handler callback type.
pub type LogHandler = Arc<dyn Fn(LogLine) + Send + Sync>;

/// Process runner options.
#[derive(Debug, Clone)]
pub struct ProcessRunnerOptions {
    /// Wrap every invocation in a container
    pub container: Option<ContainerWrap>,
    /// Dry-run mode (log commands without executing)
    pub dry_run: bool,
    /// CI mode (timestamped log lines)
    pub ci_mode: bool,
}

impl Default for ProcessRunnerOptions {
    fn default() -> Self {
        Self {
            container: None,
            dry_run: false,
            ci_mode: std::env::var("CI").is_ok(),
        }
    }
}

impl ProcessRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn ci_mode(mut self) -> Self {
        self.ci_mode = true;
        self
    }

    pub fn in_container(mut self, wrap: ContainerWrap) -> Self {
        self.container = Some(wrap);
        self
    }
}

/// Runner that spawns real processes.
#[derive(Clone)]
pub struct ProcessRunner {
    options: ProcessRunnerOptions,
    log_handler: Option<LogHandler>,
}

impl ProcessRunner {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        if let Some(wrap) = &options.container {
            info!("Running commands in {} image {}", wrap.runtime, wrap.full_image());
        }
        Self {
            options,
            log_handler: None,
        }
    }

    /// Set a log handler for streamed output.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Check if dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Rewrite the invocation for the configured backend.
    ///
    /// Returns the program to spawn and its arguments. Without a container
    /// wrap this is the config unchanged.
    fn build_invocation(&self, config: &CommandConfig) -> RunnerResult<(String, Vec<String>)> {
        let Some(wrap) = &self.options.container else {
            return Ok((config.program.clone(), config.args.clone()));
        };

        let mut args = vec!["run".to_string(), "--rm".to_string()];

        if let Some(workdir) = &config.workdir {
            // A relative bind source is parsed as a named volume
            let source = std::path::absolute(workdir).map_err(|e| {
                RunnerError::InvalidWorkdir(format!("{}: {}", workdir.to_string_lossy(), e))
            })?;
            args.push("-w".to_string());
            args.push(wrap.mount_target.clone());
            args.push("-v".to_string());
            args.push(format!("{}:{}", source.to_string_lossy(), wrap.mount_target));
        }

        let mut env: Vec<_> = config.env.iter().collect();
        env.sort();
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        // Bare names make the runtime copy the value from the host
        for name in &wrap.passthrough_env {
            if !config.env.contains_key(name) {
                args.push("-e".to_string());
                args.push(name.clone());
            }
        }

        args.push(wrap.full_image());
        args.extend(config.args.iter().cloned());

        Ok((wrap.runtime.command().to_string(), args))
    }

    fn format_invocation(program: &str, args: &[String]) -> String {
        CommandConfig::new(program).args(args.iter().cloned()).display()
    }

    fn emit(ci_mode: bool, handler: &Option<LogHandler>, stream: LogStream, line: &str) {
        let log_line = LogLine {
            timestamp: Utc::now(),
            stream,
            message: line.to_string(),
        };
        if ci_mode {
            println!(
                "[{}] [{}] {}",
                log_line.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                stream,
                line
            );
        } else {
            match stream {
                LogStream::Stdout => println!("{}", line),
                LogStream::Stderr => eprintln!("{}", line),
            }
        }
        if let Some(handler) = handler {
            handler(log_line);
        }
    }

    /// Collect a pipe line by line on a dedicated thread.
    fn spawn_collector<R: Read + Send + 'static>(
        &self,
        pipe: R,
        stream: LogStream,
        stream_logs: bool,
    ) -> std::thread::JoinHandle<String> {
        let ci_mode = self.options.ci_mode;
        let handler = self.log_handler.clone();
        std::thread::spawn(move || {
            let reader = BufReader::new(pipe);
            let mut output = String::new();
            for line in reader.lines().map_while(Result::ok) {
                output.push_str(&line);
                output.push('\n');
                if stream_logs {
                    Self::emit(ci_mode, &handler, stream, &line);
                }
            }
            output
        })
    }

    /// Spawn the process and wait for it, enforcing the timeout.
    fn execute_blocking(
        &self,
        config: &CommandConfig,
        run_config: &RunConfig,
    ) -> RunnerResult<(i64, String, String)> {
        let (program, args) = self.build_invocation(config)?;

        let mut cmd = Command::new(&program);
        cmd.args(&args);
        if self.options.container.is_none() {
            if let Some(workdir) = &config.workdir {
                cmd.current_dir(workdir);
            }
            cmd.envs(&config.env);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!("Executing: {}", Self::format_invocation(&program, &args));

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::ProgramNotAvailable(program.clone())
            } else {
                RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", program, e))
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr not captured".to_string()))?;

        let stdout_handle = self.spawn_collector(stdout, LogStream::Stdout, run_config.stream_logs);
        let stderr_handle = self.spawn_collector(stderr, LogStream::Stderr, run_config.stream_logs);

        let status = if run_config.timeout_seconds > 0 {
            let timeout = Duration::from_secs(run_config.timeout_seconds);
            let start = Instant::now();
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {
                        if start.elapsed() > timeout {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(RunnerError::Timeout(run_config.timeout_seconds));
                        }
                        std::thread::sleep(Duration::from_millis(100));
                    }
                    Err(e) => {
                        return Err(RunnerError::ExecutionFailed(format!(
                            "Failed to wait for process: {}",
                            e
                        )));
                    }
                }
            }
        } else {
            child.wait().map_err(|e| {
                RunnerError::ExecutionFailed(format!("Failed to wait for process: {}", e))
            })?
        };

        let stdout_output = stdout_handle.join().unwrap_or_default();
        let stderr_output = stderr_handle.join().unwrap_or_default();

        let exit_code = status.code().unwrap_or(-1) as i64;

        Ok((exit_code, stdout_output, stderr_output))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn is_available(&self, program: &str) -> RunnerResult<bool> {
        let (probe, args) = match &self.options.container {
            Some(wrap) => (wrap.runtime.command().to_string(), vec!["version"]),
            None => (program.to_string(), vec!["-version"]),
        };

        let status = tokio::task::spawn_blocking(move || {
            Command::new(probe)
                .args(args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
        .await
        .map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?;

        Ok(status)
    }

    async fn run(
        &self,
        config: &CommandConfig,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        if let Some(workdir) = &config.workdir {
            if !workdir.is_dir() {
                return Err(RunnerError::InvalidWorkdir(
                    workdir.to_string_lossy().to_string(),
                ));
            }
        }

        let (program, args) = self.build_invocation(config)?;
        let cmd_str = Self::format_invocation(&program, &args);

        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", cmd_str);
            return Ok(ExecutionResult {
                execution_id: "dry-run".to_string(),
                exit_code: 0,
                stdout: format!("[DRY-RUN] Command: {}", cmd_str),
                stderr: String::new(),
                started_at: Utc::now(),
                finished_at: Utc::now(),
                duration_ms: 0,
            });
        }

        let started_at = Utc::now();
        let runner = self.clone();
        let owned_config = config.clone();
        let owned_run_config = run_config.clone();
        let (exit_code, stdout, stderr) = tokio::task::spawn_blocking(move || {
            runner.execute_blocking(&owned_config, &owned_run_config)
        })
        .await
        .map_err(|e| RunnerError::ExecutionFailed(format!("Execution task failed: {}", e)))??;
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        if exit_code == 0 {
            debug!("{} completed in {}ms", cmd_str, duration_ms);
        } else if exit_code < 0 {
            warn!("{} terminated by signal after {}ms", cmd_str, duration_ms);
        } else {
            error!(
                "{} failed with exit code {} after {}ms",
                cmd_str, exit_code, duration_ms
            );
        }

        Ok(ExecutionResult {
            execution_id: uuid::Uuid::new_v4().to_string(),
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerRuntime;
    use std::path::PathBuf;

    #[test]
    fn test_local_invocation_is_unchanged() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new());
        let config = CommandConfig::new("terraform").args(["plan", "-input=false"]);

        let (program, args) = runner.build_invocation(&config).unwrap();

        assert_eq!(program, "terraform");
        assert_eq!(args, vec!["plan", "-input=false"]);
    }

    #[test]
    fn test_container_invocation() {
        let wrap = ContainerWrap::terraform(ContainerRuntime::Docker).passthrough(["TF_LOG"]);
        let runner = ProcessRunner::new(ProcessRunnerOptions::new().in_container(wrap));

        let config = CommandConfig::new("terraform")
            .args(["init", "-input=false"])
            .workdir(PathBuf::from("/host/fixture"))
            .env("TF_LOG", "DEBUG");

        let (program, args) = runner.build_invocation(&config).unwrap();

        assert_eq!(program, "docker");
        assert_eq!(&args[..2], &["run", "--rm"]);
        assert!(args.contains(&"/host/fixture:/workspace".to_string()));
        assert!(args.contains(&"TF_LOG=DEBUG".to_string()));
        assert!(args.contains(&"AWS_PROFILE".to_string()));
        // explicitly set env is not also forwarded by name
        assert!(!args.contains(&"TF_LOG".to_string()));

        let image_pos = args
            .iter()
            .position(|a| a == "hashicorp/terraform:1.6")
            .unwrap();
        assert_eq!(&args[image_pos + 1..], &["init", "-input=false"]);
    }

    #[test]
    fn test_container_mounts_relative_workdir_as_absolute() {
        let wrap = ContainerWrap::terraform(ContainerRuntime::Docker);
        let runner = ProcessRunner::new(ProcessRunnerOptions::new().in_container(wrap));
        let config = CommandConfig::new("terraform")
            .arg("plan")
            .workdir("terraform/examples/complete");

        let (_, args) = runner.build_invocation(&config).unwrap();

        let mount_pos = args.iter().position(|a| a == "-v").unwrap();
        let (source, target) = args[mount_pos + 1].rsplit_once(':').unwrap();
        assert_eq!(target, "/workspace");
        assert!(PathBuf::from(source).is_absolute(), "bind source {:?}", source);
        assert_eq!(
            PathBuf::from(source),
            std::env::current_dir().unwrap().join("terraform/examples/complete")
        );
    }

    #[test]
    fn test_dry_run_mode() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new().dry_run());
        assert!(runner.is_dry_run());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_execute() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new().dry_run());
        let config = CommandConfig::new("definitely-not-a-real-binary").arg("plan");

        let result = runner.run(&config, &RunConfig::default()).await.unwrap();

        assert!(result.success());
        assert!(result.stdout.contains("definitely-not-a-real-binary plan"));
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new());
        let config = CommandConfig::new("kmstest-missing-program-4b1d").arg("plan");

        let err = runner.run(&config, &RunConfig::default()).await.unwrap_err();

        assert!(matches!(err, RunnerError::ProgramNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_workdir_is_rejected() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new());
        let config = CommandConfig::new("terraform")
            .arg("plan")
            .workdir("/nonexistent/kmstest/fixture");

        let err = runner.run(&config, &RunConfig::default()).await.unwrap_err();

        assert!(matches!(err, RunnerError::InvalidWorkdir(_)));
    }
}
