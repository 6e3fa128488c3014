//! CLI command definitions.
//!
//! Each subcommand maps to one harness operation: running the plan
//! scenarios, or one of the helpers used when writing or debugging them.

use clap::{Parser, Subcommand};

pub mod name_prefix;
pub mod plan_summary;
pub mod retry_table;
pub mod run;
pub mod scenarios;

/// kmstest - plan scenarios for the KMS key terraform module
#[derive(Parser)]
#[command(name = "kmstest")]
#[command(version, about = "kmstest - plan scenarios for the KMS key terraform module")]
#[command(long_about = r#"
kmstest runs plan-only integration scenarios against the KMS key module's
example fixtures. Each scenario initializes and plans a fixture with a
unique name prefix, checks the plan output, then runs terraform destroy.

COMMANDS:
  run           → Run the plan scenarios (in parallel by default)
  scenarios     → List scenarios or print them as YAML
  name-prefix   → Generate resource name prefixes
  retry-table   → Show the retryable error table
  plan-summary  → Summarize a saved plan output

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Scenario failure
  5 - Terraform error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run plan scenarios against the module fixtures
    Run(run::RunArgs),

    /// List the scenario suite
    Scenarios(scenarios::ScenariosArgs),

    /// Generate a unique resource name prefix
    #[command(name = "name-prefix")]
    NamePrefix(name_prefix::NamePrefixArgs),

    /// Show the retryable error classification table
    #[command(name = "retry-table")]
    RetryTable(retry_table::RetryTableArgs),

    /// Parse a saved `terraform plan` output
    #[command(name = "plan-summary")]
    PlanSummary(plan_summary::PlanSummaryArgs),
}
