//! Plan tests for the KMS module against a real terraform and AWS account.
//!
//! Ignored by default. Run with
//! `KMSTEST_FIXTURES_DIR=<module>/examples cargo test -- --ignored`
//! with AWS credentials and region in the environment.

use std::path::PathBuf;
use std::sync::Arc;

use kmstest_runner::{ProcessRunner, ProcessRunnerOptions};
use kmstest_terraform::catalog::{
    ALARMS_TOPIC_ADDRESS, KMS_ALIAS_ADDRESS, KMS_KEY_ADDRESS,
};
use kmstest_terraform::plan::{NO_CHANGES, WILL_PERFORM_ACTIONS};
use kmstest_terraform::{
    base_options, generate_name_prefix, with_cleanup, HarnessConfig, Terraform, TerraformOptions,
};

fn harness() -> (Terraform, HarnessConfig) {
    let config = HarnessConfig::from_env().expect("valid KMSTEST_* environment");
    let runner = ProcessRunner::new(ProcessRunnerOptions::default());
    (Terraform::new(Arc::new(runner)), config)
}

fn fixture_options(config: &HarnessConfig, fixture: &str) -> TerraformOptions {
    let dir: PathBuf = config.fixtures_dir.join(fixture);
    base_options(dir)
        .with_terraform_binary(config.terraform_binary.clone())
        .with_time_between_retries(config.retry_delay())
}

#[tokio::test]
#[ignore = "requires terraform and AWS credentials"]
async fn test_terraform_complete_example() {
    let (terraform, config) = harness();
    let options = fixture_options(&config, "complete")
        .with_var("name_prefix", generate_name_prefix("comp"))
        .with_var("environment_type", "None");

    let cleaned = with_cleanup(&terraform, &options, || async {
        let plan = terraform.init_and_plan(&options).await.expect("init and plan");

        assert!(!plan.is_empty());
        assert!(plan.contains(KMS_KEY_ADDRESS));
        assert!(plan.contains(KMS_ALIAS_ADDRESS));
        assert!(plan.contains("will be created"));
        // alarms are enabled in the complete example
        assert!(plan.contains(ALARMS_TOPIC_ADDRESS));
        assert!(plan.contains("3 to add, 0 to change, 0 to destroy"));
    })
    .await;

    cleaned.cleanup.expect("terraform destroy");
}

#[tokio::test]
#[ignore = "requires terraform and AWS credentials"]
async fn test_enabled_false() {
    let (terraform, config) = harness();
    let options = fixture_options(&config, "complete")
        .with_var("enabled", false)
        .with_var("name_prefix", generate_name_prefix("comp"))
        .with_var("environment_type", "None");

    let cleaned = with_cleanup(&terraform, &options, || async {
        let plan = terraform.init_and_plan(&options).await.expect("init and plan");

        assert!(!plan.is_empty());
        assert!(plan.contains(NO_CHANGES));
    })
    .await;

    cleaned.cleanup.expect("terraform destroy");
}

#[tokio::test]
#[ignore = "requires terraform and AWS credentials"]
async fn test_terraform_defaults_example() {
    let (terraform, config) = harness();
    let options =
        fixture_options(&config, "defaults").with_var("name_prefix", generate_name_prefix("def"));

    let cleaned = with_cleanup(&terraform, &options, || async {
        let plan = terraform.init_and_plan(&options).await.expect("init and plan");

        assert!(!plan.is_empty());
        assert!(plan.contains(WILL_PERFORM_ACTIONS));
    })
    .await;

    cleaned.cleanup.expect("terraform destroy");
}

#[tokio::test]
#[ignore = "requires terraform and AWS credentials"]
async fn test_terraform_defaults_resources() {
    let (terraform, config) = harness();
    let options =
        fixture_options(&config, "defaults").with_var("name_prefix", generate_name_prefix("def"));

    let cleaned = with_cleanup(&terraform, &options, || async {
        let plan = terraform.init_and_plan(&options).await.expect("init and plan");

        assert!(plan.contains(KMS_KEY_ADDRESS));
        assert!(plan.contains(KMS_ALIAS_ADDRESS));
        assert!(plan.contains("will be created"));
        // alarms default to off
        assert!(!plan.contains(ALARMS_TOPIC_ADDRESS));
        assert!(plan.contains("2 to add, 0 to change, 0 to destroy"));

        // a second plan with the same options reports the same counts
        let again = terraform.plan(&options).await.expect("second plan");
        assert_eq!(plan.summary, again.summary);
    })
    .await;

    cleaned.cleanup.expect("terraform destroy");
}
