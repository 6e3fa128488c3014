//! Terraform operations driven through a [`CommandRunner`].

use std::sync::Arc;

use tracing::{debug, info};

use kmstest_runner::{CommandConfig, CommandRunner, RunConfig};

use crate::args;
use crate::error::{TerraformError, TerraformResult};
use crate::options::TerraformOptions;
use crate::plan::PlanOutput;
use crate::retry::do_with_retryable_errors;

/// Runs terraform subcommands for a set of [`TerraformOptions`].
#[derive(Clone)]
pub struct Terraform {
    runner: Arc<dyn CommandRunner>,
    run_config: RunConfig,
}

impl Terraform {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            run_config: RunConfig::default(),
        }
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Check that the configured binary can be launched.
    pub async fn is_available(&self, options: &TerraformOptions) -> TerraformResult<bool> {
        Ok(self.runner.is_available(&options.terraform_binary).await?)
    }

    /// Run `terraform version`.
    pub async fn version(&self, options: &TerraformOptions) -> TerraformResult<String> {
        let config = CommandConfig::new(&options.terraform_binary)
            .arg("version")
            .envs(&options.env_vars);
        let result = self.runner.run(&config, &self.run_config).await?;
        if !result.success() {
            return Err(TerraformError::TerraformNotAvailable(result.combined_output()));
        }
        Ok(result.stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Run `terraform init`.
    pub async fn init(&self, options: &TerraformOptions) -> TerraformResult<String> {
        info!("Running terraform init in {:?}", options.terraform_dir);
        self.run_with_retries(options, args::init_args(options)).await
    }

    /// Run `terraform validate`.
    pub async fn validate(&self, options: &TerraformOptions) -> TerraformResult<String> {
        info!("Running terraform validate in {:?}", options.terraform_dir);
        self.run_with_retries(options, args::validate_args(options)).await
    }

    /// Run `terraform plan` and parse its output.
    pub async fn plan(&self, options: &TerraformOptions) -> TerraformResult<PlanOutput> {
        info!("Running terraform plan in {:?}", options.terraform_dir);
        let output = self.run_with_retries(options, args::plan_args(options)).await?;
        let plan = PlanOutput::parse(&output);
        if let Some(summary) = plan.summary {
            info!("Plan for {:?}: {}", options.terraform_dir, summary);
        }
        Ok(plan)
    }

    /// Run `terraform init` followed by `terraform plan`.
    pub async fn init_and_plan(&self, options: &TerraformOptions) -> TerraformResult<PlanOutput> {
        self.init(options).await?;
        self.plan(options).await
    }

    /// Run `terraform apply -auto-approve`.
    pub async fn apply(&self, options: &TerraformOptions) -> TerraformResult<String> {
        info!("Running terraform apply in {:?}", options.terraform_dir);
        self.run_with_retries(options, args::apply_args(options)).await
    }

    /// Run `terraform destroy -auto-approve`.
    pub async fn destroy(&self, options: &TerraformOptions) -> TerraformResult<String> {
        info!("Running terraform destroy in {:?}", options.terraform_dir);
        self.run_with_retries(options, args::destroy_args(options)).await
    }

    async fn run_with_retries(
        &self,
        options: &TerraformOptions,
        args: Vec<String>,
    ) -> TerraformResult<String> {
        options.validate()?;

        let subcommand = args.first().cloned().unwrap_or_default();
        let description = format!("terraform {}", subcommand);
        let config = CommandConfig::new(&options.terraform_binary)
            .args(args)
            .workdir(&options.terraform_dir)
            .envs(&options.env_vars);

        do_with_retryable_errors(
            &description,
            &options.retryable_errors,
            options.max_retries,
            options.time_between_retries,
            || self.run_once(&subcommand, &config),
        )
        .await
    }

    async fn run_once(&self, subcommand: &str, config: &CommandConfig) -> TerraformResult<String> {
        debug!("Executing {}", config.display());
        let result = self.runner.run(config, &self.run_config).await?;

        if result.success() {
            Ok(result.stdout)
        } else {
            Err(TerraformError::CommandFailed {
                command: subcommand.to_string(),
                exit_code: result.exit_code,
                output: result.combined_output(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use kmstest_runner::{MockResponse, MockRunner};
    use tempfile::tempdir;

    use crate::options::base_options;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.tf"), "module \"main\" {\n  source = \"../..\"\n}\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_plan_runs_in_fixture_dir() {
        let dir = fixture();
        let mock = MockRunner::new().on(
            "plan",
            MockResponse::success("Plan: 2 to add, 0 to change, 0 to destroy.\n"),
        );
        let terraform = Terraform::new(Arc::new(mock.clone()));
        let options = base_options(dir.path())
            .with_var("name_prefix", "def-abc")
            .with_env("AWS_REGION", "us-east-1");

        let plan = terraform.plan(&options).await.unwrap();

        assert_eq!(plan.summary.unwrap().add, 2);
        let call = &mock.get_subcommand_calls("plan")[0];
        assert_eq!(call.workdir.as_deref(), Some(dir.path()));
        assert_eq!(call.env.get("AWS_REGION"), Some(&"us-east-1".to_string()));
        assert!(call.args.contains(&"name_prefix=def-abc".to_string()));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let dir = fixture();
        let mock = MockRunner::new().on_sequence(
            "init",
            vec![
                MockResponse::failure(1, "Error: RequestError: send request failed"),
                MockResponse::success("Terraform has been successfully initialized!"),
            ],
        );
        let terraform = Terraform::new(Arc::new(mock.clone()));
        let options = base_options(dir.path()).with_time_between_retries(Duration::ZERO);

        terraform.init(&options).await.unwrap();

        assert_eq!(mock.get_subcommand_calls("init").len(), 2);
    }

    #[tokio::test]
    async fn test_unclassified_failure_is_fatal() {
        let dir = fixture();
        let mock = MockRunner::new().on(
            "plan",
            MockResponse::failure(1, "Error: Reference to undeclared input variable"),
        );
        let terraform = Terraform::new(Arc::new(mock.clone()));
        let options = base_options(dir.path()).with_time_between_retries(Duration::ZERO);

        let err = terraform.plan(&options).await.unwrap_err();

        assert!(matches!(err, TerraformError::CommandFailed { exit_code: 1, .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_setup_failure_runs_nothing() {
        let mock = MockRunner::new();
        let terraform = Terraform::new(Arc::new(mock.clone()));

        let err = terraform
            .init(&base_options("/no/such/fixture"))
            .await
            .unwrap_err();

        assert!(matches!(err, TerraformError::Setup(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_version_first_line() {
        let mock = MockRunner::new().on(
            "version",
            MockResponse::success("Terraform v1.6.6\non linux_amd64\n"),
        );
        let terraform = Terraform::new(Arc::new(mock));

        let version = terraform.version(&base_options("unused")).await.unwrap();

        assert_eq!(version, "Terraform v1.6.6");
    }
}
