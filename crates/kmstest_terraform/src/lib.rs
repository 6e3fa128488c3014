//! # kmstest_terraform
//!
//! Plan-level integration testing for the KMS key terraform module.
//!
//! This crate builds terraform options, runs `init`/`plan`/`destroy`
//! through a [`kmstest_runner::CommandRunner`], retries transient cloud
//! failures, parses plan output and checks it against scenario
//! expectations, always cleaning up afterwards.
//!
//! ## Features
//!
//! - Base options with a fixed AWS retry-classification table
//! - Collision-resistant resource name prefixes for parallel runs
//! - Plan summary and resource-change parsing
//! - Scenario runner with guaranteed `destroy`, also on panics
//! - The four KMS module scenarios, in code and as YAML
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use kmstest_runner::{ProcessRunner, ProcessRunnerOptions};
//! use kmstest_terraform::{base_options, generate_name_prefix, with_cleanup, Terraform};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let terraform = Terraform::new(Arc::new(ProcessRunner::new(ProcessRunnerOptions::default())));
//!     let options = base_options("terraform/examples/defaults")
//!         .with_var("name_prefix", generate_name_prefix("def"));
//!
//!     let cleaned = with_cleanup(&terraform, &options, || terraform.init_and_plan(&options)).await;
//!     let plan = cleaned.value?;
//!     assert!(plan.contains("2 to add, 0 to change, 0 to destroy"));
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod catalog;
pub mod config;
pub mod error;
pub mod names;
pub mod options;
pub mod plan;
pub mod retry;
pub mod scenario;
pub mod terraform;

pub use catalog::kms_module_suite;
pub use config::HarnessConfig;
pub use error::{TerraformError, TerraformResult};
pub use names::{generate_name_prefix, name_prefix_from_id, unique_id, RANDOM_ID_LENGTH};
pub use options::{base_options, TerraformOptions};
pub use plan::{ChangeAction, PlanOutput, PlanSummary, ResourceChange};
pub use retry::{do_with_retryable_errors, RetryMatch, RetryableErrors};
pub use scenario::{
    with_cleanup, Cleaned, CleanupOutcome, Expectation, Scenario, ScenarioOutcome, ScenarioPhase,
    ScenarioReport, ScenarioRunner, ScenarioSuite,
};
pub use terraform::Terraform;
