//! Scenarios command - List the scenario suite or print it as YAML.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use kmstest_terraform::{kms_module_suite, ScenarioSuite};

use crate::ExitCodes;

#[derive(Args)]
pub struct ScenariosArgs {
    /// Scenario suite YAML (defaults to the built-in KMS module suite)
    #[arg(long)]
    pub suite: Option<PathBuf>,

    /// Only list scenarios whose name contains this string
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Print the suite as YAML
    #[arg(long)]
    pub yaml: bool,
}

pub fn execute(args: ScenariosArgs) -> Result<u8> {
    let suite = match &args.suite {
        Some(path) => ScenarioSuite::from_file(path)?,
        None => kms_module_suite(),
    };
    let selected = ScenarioSuite {
        scenarios: suite.matching(args.filter.as_deref()),
    };

    if args.yaml {
        print!("{}", selected.to_yaml()?);
        return Ok(ExitCodes::SUCCESS);
    }

    for scenario in &selected.scenarios {
        println!("📦 {} ({}/, label {})", scenario.name, scenario.fixture, scenario.label);
        for (name, value) in &scenario.vars {
            println!("   var {} = {}", name, value);
        }
        for expectation in &scenario.expectations {
            println!("   expect {}", expectation);
        }
    }
    println!("\n{} scenario(s)", selected.scenarios.len());

    Ok(ExitCodes::SUCCESS)
}
