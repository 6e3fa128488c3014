//! # kmstest_runner
//!
//! Process execution layer for the kmstest harness.
//!
//! Every terraform invocation made by the harness goes through a
//! [`CommandRunner`]. The production implementation spawns the program
//! locally, optionally wrapped in a Docker or Podman container; the mock
//! implementation returns scripted responses so scenario logic can be
//! tested without terraform or cloud credentials.
//!
//! # Features
//!
//! - **Local execution**: spawn the binary in a working directory with extra env vars
//! - **Container wrapping**: run the same command inside `hashicorp/terraform`
//! - **Dry-Run Mode**: log commands without executing them
//! - **CI Integration**: timestamped log lines compatible with CI log viewers
//! - **Mock Runner**: scripted responses and captured calls for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use kmstest_runner::{CommandConfig, CommandRunner, ProcessRunner, ProcessRunnerOptions, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = ProcessRunner::new(ProcessRunnerOptions::default());
//!
//!     let config = CommandConfig::new("terraform")
//!         .arg("version")
//!         .workdir("./terraform/examples/complete");
//!
//!     let result = runner.run(&config, &RunConfig::default()).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::{CommandConfig, ContainerRuntime, ContainerWrap, RunConfig};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use process::{LogHandler, LogLine, LogStream, ProcessRunner, ProcessRunnerOptions};
pub use runner::{CommandRunner, ExecutionResult};
