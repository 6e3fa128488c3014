//! Shared fixtures for the terraform integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

pub const COMPLETE_PLAN: &str = r#"
Terraform used the selected providers to generate the following execution
plan. Resource actions are indicated with the following symbols:
  + create

Terraform will perform the following actions:

  # module.main.aws_kms_alias.main[0] will be created
  + resource "aws_kms_alias" "main" {
      + arn            = (known after apply)
      + name           = "alias/comp-x1y2z30000"
      + target_key_id  = (known after apply)
    }

  # module.main.aws_kms_key.main[0] will be created
  + resource "aws_kms_key" "main" {
      + arn                     = (known after apply)
      + deletion_window_in_days = 30
      + enable_key_rotation     = true
      + key_id                  = (known after apply)
    }

  # module.main.aws_sns_topic.alarms[0] will be created
  + resource "aws_sns_topic" "alarms" {
      + arn  = (known after apply)
      + name = "comp-x1y2z30000-kms-alarms"
    }

Plan: 3 to add, 0 to change, 0 to destroy.
"#;

pub const DEFAULTS_PLAN: &str = r#"
Terraform used the selected providers to generate the following execution
plan. Resource actions are indicated with the following symbols:
  + create

Terraform will perform the following actions:

  # module.main.aws_kms_alias.main[0] will be created
  + resource "aws_kms_alias" "main" {
      + name = "alias/def-a1b2c30000"
    }

  # module.main.aws_kms_key.main[0] will be created
  + resource "aws_kms_key" "main" {
      + enable_key_rotation = true
    }

Plan: 2 to add, 0 to change, 0 to destroy.
"#;

pub const NO_CHANGES_PLAN: &str = r#"
No changes. Your infrastructure matches the configuration.

Terraform has compared your real infrastructure against your configuration
and found no differences, so no changes are needed.
"#;

/// A fixtures root with `complete/` and `defaults/` module directories.
pub fn fixtures_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    for name in ["complete", "defaults"] {
        write_fixture(&root.path().join(name));
    }
    root
}

fn write_fixture(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("main.tf"),
        "module \"main\" {\n  source      = \"../..\"\n  name_prefix = var.name_prefix\n}\n",
    )
    .unwrap();
    fs::write(
        dir.join("variables.tf"),
        "variable \"name_prefix\" {\n  type = string\n}\n",
    )
    .unwrap();
}
