//! kmstest CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Scenario failure
//! - 5: Terraform error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const SCENARIO_FAILURE: u8 = 3;
    pub const TERRAFORM_ERROR: u8 = 5;
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "kmstest=debug"
    } else if cli.quiet {
        "kmstest=warn"
    } else {
        "kmstest=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,{}", default_level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let log_result = if cli.log_json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::NamePrefix(args) => commands::name_prefix::execute(args),
        Commands::RetryTable(args) => commands::retry_table::execute(args),
        Commands::PlanSummary(args) => commands::plan_summary::execute(args),
        Commands::Scenarios(args) => commands::scenarios::execute(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    use kmstest_terraform::TerraformError;

    match e.downcast_ref::<TerraformError>() {
        Some(TerraformError::Setup(_))
        | Some(TerraformError::InvalidVariable { .. })
        | Some(TerraformError::ScenarioFile(_))
        | Some(TerraformError::Yaml(_)) => ExitCodes::INVALID_ARGS,
        Some(_) => ExitCodes::TERRAFORM_ERROR,
        None => ExitCodes::GENERAL_ERROR,
    }
}
