//! Run command - Run plan scenarios against the module fixtures.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use kmstest_runner::{
    ContainerRuntime, ContainerWrap, ProcessRunner, ProcessRunnerOptions, RunConfig,
};
use kmstest_terraform::{
    base_options, kms_module_suite, CleanupOutcome, HarnessConfig, ScenarioReport,
    ScenarioRunner, ScenarioSuite, Terraform, TerraformError,
};

use crate::ExitCodes;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RuntimeArg {
    Docker,
    Podman,
}

impl From<RuntimeArg> for ContainerRuntime {
    fn from(value: RuntimeArg) -> Self {
        match value {
            RuntimeArg::Docker => ContainerRuntime::Docker,
            RuntimeArg::Podman => ContainerRuntime::Podman,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Only run scenarios whose name contains this string
    #[arg(short, long)]
    pub scenario: Option<String>,

    /// Scenario suite YAML (defaults to the built-in KMS module suite)
    #[arg(long)]
    pub suite: Option<PathBuf>,

    /// Directory containing the `complete` and `defaults` fixtures
    #[arg(long)]
    pub fixtures_dir: Option<PathBuf>,

    /// Terraform binary to run
    #[arg(long)]
    pub terraform_bin: Option<String>,

    /// Run terraform inside this image (e.g. hashicorp/terraform:1.6)
    #[arg(long)]
    pub image: Option<String>,

    /// Container runtime used with --image
    #[arg(long, value_enum, env = "KMSTEST_CONTAINER_RUNTIME", default_value = "docker")]
    pub runtime: RuntimeArg,

    /// Seconds between retries of transient errors
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Run scenarios one after another
    #[arg(long)]
    pub sequential: bool,

    /// Echo terraform output while it runs
    #[arg(long)]
    pub stream: bool,

    /// Log terraform commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,
}

/// Resolve configuration: environment first, flags on top.
fn resolve_config(args: &RunArgs) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::from_env().context("Invalid KMSTEST_* environment")?;
    if let Some(dir) = &args.fixtures_dir {
        config.fixtures_dir = dir.clone();
    }
    if let Some(bin) = &args.terraform_bin {
        config.terraform_binary = bin.clone();
    }
    if let Some(image) = &args.image {
        config.terraform_image = Some(image.clone());
    }
    if let Some(delay) = args.retry_delay {
        config.retry_delay_secs = delay;
    }
    Ok(config)
}

fn build_runner(args: &RunArgs, config: &HarnessConfig) -> ProcessRunner {
    let mut options = ProcessRunnerOptions::default();
    if args.dry_run {
        options = options.dry_run();
    }
    if let Some((image, tag)) = config.image_and_tag() {
        let wrap = ContainerWrap::terraform(args.runtime.into());
        options = options.in_container(ContainerWrap {
            image,
            tag,
            ..wrap
        });
    }
    ProcessRunner::new(options)
}

pub async fn execute(args: RunArgs) -> Result<u8> {
    let config = resolve_config(&args)?;

    let suite = match &args.suite {
        Some(path) => ScenarioSuite::from_file(path)
            .with_context(|| format!("Failed to load scenario suite {:?}", path))?,
        None => kms_module_suite(),
    };

    let scenarios = suite.matching(args.scenario.as_deref());
    if scenarios.is_empty() {
        println!("⚠️  No scenarios match {:?}", args.scenario.as_deref().unwrap_or(""));
        return Ok(ExitCodes::INVALID_ARGS);
    }

    if !config.fixtures_dir.is_dir() {
        return Err(TerraformError::Setup(format!(
            "fixtures directory not found: {}",
            config.fixtures_dir.display()
        ))
        .into());
    }

    let run_config = RunConfig::default().stream_logs(args.stream);
    let terraform =
        Terraform::new(Arc::new(build_runner(&args, &config))).with_run_config(run_config);

    if !args.dry_run {
        let probe = base_options(&config.fixtures_dir)
            .with_terraform_binary(config.terraform_binary.clone());
        if !terraform.is_available(&probe).await? {
            return Err(TerraformError::TerraformNotAvailable(config.terraform_binary.clone()).into());
        }
    }

    let runner = ScenarioRunner::new(terraform, &config.fixtures_dir)
        .with_terraform_binary(config.terraform_binary.clone())
        .with_time_between_retries(Duration::from_secs(config.retry_delay_secs));

    info!(
        "Running {} scenario(s) from {:?}",
        scenarios.len(),
        config.fixtures_dir
    );
    if !args.json {
        println!("🧪 Running {} scenario(s)...\n", scenarios.len());
    }

    let reports = if args.sequential {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            reports.push(runner.run(scenario).await);
        }
        reports
    } else {
        runner.run_all(&scenarios).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports);
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        warn!("{} scenario(s) failed", failed);
        return Ok(ExitCodes::SCENARIO_FAILURE);
    }

    Ok(ExitCodes::SUCCESS)
}

fn print_reports(reports: &[ScenarioReport]) {
    for report in reports {
        let mark = if report.is_success() { "✅" } else { "❌" };
        let summary = report
            .summary
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no plan".to_string());
        println!(
            "{} {} ({}) - {} [{}ms]",
            mark, report.name, report.name_prefix, summary, report.duration_ms
        );
        for failure in &report.failures {
            println!("   - {}", failure);
        }
        if let CleanupOutcome::Failed(err) = &report.cleanup {
            println!("   ⚠️  cleanup failed: {}", err);
        }
    }

    let passed = reports.iter().filter(|r| r.is_success()).count();
    println!();
    println!(
        "Results: {} passed, {} failed",
        passed,
        reports.len() - passed
    );
}
