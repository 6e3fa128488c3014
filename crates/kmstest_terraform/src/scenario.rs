//! Plan scenarios with guaranteed cleanup.
//!
//! A scenario builds options for one fixture, runs `init` and `plan`,
//! checks the plan text against its expectations and always finishes with
//! `destroy`, whatever happened before.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{TerraformError, TerraformResult};
use crate::names::generate_name_prefix;
use crate::options::{base_options, TerraformOptions};
use crate::plan::{PlanOutput, PlanSummary};
use crate::terraform::Terraform;

/// Variable every scenario receives with a freshly generated value.
pub const NAME_PREFIX_VAR: &str = "name_prefix";

/// A single check against plan output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", content = "value", rename_all = "snake_case")]
pub enum Expectation {
    NotEmpty,
    Contains(String),
    NotContains(String),
    Summary(PlanSummary),
    NoChanges,
}

impl Expectation {
    pub fn check(&self, plan: &PlanOutput) -> Result<(), String> {
        match self {
            Self::NotEmpty if plan.is_empty() => Err("plan output is empty".to_string()),
            Self::Contains(needle) if !plan.contains(needle) => {
                Err(format!("plan output does not contain {:?}", needle))
            }
            Self::NotContains(needle) if plan.contains(needle) => {
                Err(format!("plan output unexpectedly contains {:?}", needle))
            }
            Self::Summary(expected) => match plan.summary {
                // "No changes." parses as 0/0/0
                Some(actual) if actual == *expected => Ok(()),
                Some(actual) => Err(format!("expected \"{}\", plan has \"{}\"", expected, actual)),
                None => Err(format!("expected \"{}\", plan has no summary", expected)),
            },
            Self::NoChanges if !plan.has_no_changes() => {
                Err("plan output does not report \"No changes.\"".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEmpty => write!(f, "not empty"),
            Self::Contains(s) => write!(f, "contains {:?}", s),
            Self::NotContains(s) => write!(f, "does not contain {:?}", s),
            Self::Summary(s) => write!(f, "summary \"{}\"", s),
            Self::NoChanges => write!(f, "no changes"),
        }
    }
}

/// One plan scenario against a fixture directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Fixture directory, relative to the fixtures root
    pub fixture: String,
    /// Label used for the generated name prefix
    pub label: String,
    /// Variables besides `name_prefix`
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub expectations: Vec<Expectation>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, fixture: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixture: fixture.into(),
            label: label.into(),
            vars: BTreeMap::new(),
            env: HashMap::new(),
            expectations: Vec::new(),
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    /// Check every expectation, collecting all failures.
    pub fn check(&self, plan: &PlanOutput) -> Vec<String> {
        self.expectations
            .iter()
            .filter_map(|e| e.check(plan).err())
            .collect()
    }
}

/// A set of scenarios loaded from YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSuite {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSuite {
    pub fn from_yaml(content: &str) -> TerraformResult<Self> {
        let suite: Self = serde_yaml::from_str(content)?;
        let mut seen = std::collections::HashSet::new();
        for scenario in &suite.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(TerraformError::ScenarioFile(format!(
                    "duplicate scenario name: {}",
                    scenario.name
                )));
            }
        }
        Ok(suite)
    }

    pub fn from_file(path: &Path) -> TerraformResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> TerraformResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Scenarios whose name contains `filter`.
    pub fn matching(&self, filter: Option<&str>) -> Vec<Scenario> {
        self.scenarios
            .iter()
            .filter(|s| filter.map_or(true, |f| s.name.contains(f)))
            .cloned()
            .collect()
    }
}

/// Furthest point a scenario reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    Init,
    PlanRequested,
    PlanObtained,
    Done,
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::PlanRequested => "plan requested",
            Self::PlanObtained => "plan obtained",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Destroyed,
    Failed(String),
    /// Setup failed, nothing was provisioned
    Skipped,
}

/// Result of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub name_prefix: String,
    pub outcome: ScenarioOutcome,
    pub phase: ScenarioPhase,
    pub summary: Option<PlanSummary>,
    pub failures: Vec<String>,
    pub cleanup: CleanupOutcome,
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// Passed its checks and was cleaned up.
    pub fn is_success(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
            && !matches!(self.cleanup, CleanupOutcome::Failed(_))
    }
}

/// Output of [`with_cleanup`]: the body's value plus the destroy result.
#[derive(Debug)]
pub struct Cleaned<T> {
    pub value: T,
    pub cleanup: TerraformResult<()>,
}

/// Run `body`, then `terraform destroy` exactly once.
///
/// Destroy also runs when the body panics; the panic is resumed afterwards.
/// A destroy failure is logged and returned next to the body's value so it
/// never replaces the body's own result.
pub async fn with_cleanup<T, F, Fut>(
    terraform: &Terraform,
    options: &TerraformOptions,
    body: F,
) -> Cleaned<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let outcome = AssertUnwindSafe(async move { body().await }).catch_unwind().await;

    let cleanup = terraform.destroy(options).await.map(|_| ());
    if let Err(e) = &cleanup {
        error!("Cleanup of {:?} failed: {}", options.terraform_dir, e);
    }

    match outcome {
        Ok(value) => Cleaned { value, cleanup },
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Runs scenarios against fixtures under a common root.
#[derive(Clone)]
pub struct ScenarioRunner {
    terraform: Terraform,
    fixtures_root: PathBuf,
    terraform_binary: Option<String>,
    time_between_retries: Option<Duration>,
    env: HashMap<String, String>,
}

impl ScenarioRunner {
    pub fn new(terraform: Terraform, fixtures_root: impl Into<PathBuf>) -> Self {
        Self {
            terraform,
            fixtures_root: fixtures_root.into(),
            terraform_binary: None,
            time_between_retries: None,
            env: HashMap::new(),
        }
    }

    pub fn with_terraform_binary(mut self, binary: impl Into<String>) -> Self {
        self.terraform_binary = Some(binary.into());
        self
    }

    pub fn with_time_between_retries(mut self, delay: Duration) -> Self {
        self.time_between_retries = Some(delay);
        self
    }

    /// Environment added to every scenario (scenario env wins).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn fixtures_root(&self) -> &Path {
        &self.fixtures_root
    }

    /// Options for `scenario` with the given name prefix.
    pub fn build_options(&self, scenario: &Scenario, name_prefix: &str) -> TerraformOptions {
        let mut options = base_options(self.fixtures_root.join(&scenario.fixture));
        if let Some(binary) = &self.terraform_binary {
            options = options.with_terraform_binary(binary.clone());
        }
        if let Some(delay) = self.time_between_retries {
            options = options.with_time_between_retries(delay);
        }

        let mut vars = scenario.vars.clone();
        vars.insert(NAME_PREFIX_VAR.to_string(), Value::from(name_prefix));
        options = options.with_vars(vars);

        options.env_vars = self.env.clone();
        options.env_vars.extend(scenario.env.clone());
        options
    }

    /// Run one scenario to a terminal state, then clean up.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let started = std::time::Instant::now();
        let name_prefix = generate_name_prefix(&scenario.label);
        let options = self.build_options(scenario, &name_prefix);
        info!("Scenario {} using prefix {}", scenario.name, name_prefix);

        let mut report = ScenarioReport {
            name: scenario.name.clone(),
            name_prefix,
            outcome: ScenarioOutcome::Failed,
            phase: ScenarioPhase::Init,
            summary: None,
            failures: Vec::new(),
            cleanup: CleanupOutcome::Skipped,
            duration_ms: 0,
        };

        if let Err(e) = options.validate() {
            error!("Scenario {} setup failed: {}", scenario.name, e);
            report.failures.push(e.to_string());
            report.duration_ms = started.elapsed().as_millis() as u64;
            return report;
        }

        report.phase = ScenarioPhase::PlanRequested;
        let cleaned = with_cleanup(&self.terraform, &options, || {
            self.terraform.init_and_plan(&options)
        })
        .await;

        match cleaned.value {
            Ok(plan) => {
                report.phase = ScenarioPhase::PlanObtained;
                report.summary = plan.summary;
                report.failures = scenario.check(&plan);
                if report.failures.is_empty() {
                    report.phase = ScenarioPhase::Done;
                    report.outcome = ScenarioOutcome::Passed;
                }
            }
            Err(e) => report.failures.push(e.to_string()),
        }

        report.cleanup = match cleaned.cleanup {
            Ok(()) => CleanupOutcome::Destroyed,
            Err(e) => CleanupOutcome::Failed(e.to_string()),
        };

        match report.outcome {
            ScenarioOutcome::Passed => info!("Scenario {} passed", scenario.name),
            ScenarioOutcome::Failed => warn!(
                "Scenario {} failed at {}: {}",
                scenario.name,
                report.phase,
                report.failures.join("; ")
            ),
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    /// Run scenarios concurrently, one task each. Reports keep input order.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        let (names, handles): (Vec<_>, Vec<_>) = scenarios
            .iter()
            .cloned()
            .map(|scenario| {
                let runner = self.clone();
                let name = scenario.name.clone();
                (name, tokio::spawn(async move { runner.run(&scenario).await }))
            })
            .unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(result, name)| {
                result.unwrap_or_else(|e| ScenarioReport {
                    name,
                    name_prefix: String::new(),
                    outcome: ScenarioOutcome::Failed,
                    phase: ScenarioPhase::Init,
                    summary: None,
                    failures: vec![format!("scenario task aborted: {}", e)],
                    cleanup: CleanupOutcome::Skipped,
                    duration_ms: 0,
                })
            })
            .collect()
    }
}
