//! Harness configuration resolved from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TerraformError, TerraformResult};
use crate::options::DEFAULT_TIME_BETWEEN_RETRIES;

pub const FIXTURES_DIR_ENV: &str = "KMSTEST_FIXTURES_DIR";
pub const TERRAFORM_BIN_ENV: &str = "KMSTEST_TERRAFORM_BIN";
pub const TERRAFORM_IMAGE_ENV: &str = "KMSTEST_TERRAFORM_IMAGE";
pub const RETRY_DELAY_ENV: &str = "KMSTEST_RETRY_DELAY_SECS";

/// Where fixtures live and how terraform is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub fixtures_dir: PathBuf,
    pub terraform_binary: String,
    /// `image[:tag]` to run terraform in, instead of the local binary
    pub terraform_image: Option<String>,
    pub retry_delay_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fixtures_dir: PathBuf::from("terraform/examples"),
            terraform_binary: "terraform".to_string(),
            terraform_image: None,
            retry_delay_secs: DEFAULT_TIME_BETWEEN_RETRIES.as_secs(),
        }
    }
}

impl HarnessConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> TerraformResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> TerraformResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(FIXTURES_DIR_ENV).filter(|v| !v.is_empty()) {
            config.fixtures_dir = PathBuf::from(dir);
        }
        if let Some(bin) = lookup(TERRAFORM_BIN_ENV).filter(|v| !v.is_empty()) {
            config.terraform_binary = bin;
        }
        config.terraform_image = lookup(TERRAFORM_IMAGE_ENV).filter(|v| !v.is_empty());
        if let Some(delay) = lookup(RETRY_DELAY_ENV) {
            config.retry_delay_secs = delay.trim().parse().map_err(|_| {
                TerraformError::Setup(format!("{} must be a number of seconds, got {:?}", RETRY_DELAY_ENV, delay))
            })?;
        }

        Ok(config)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Split `terraform_image` into image and tag (tag defaults to `latest`).
    pub fn image_and_tag(&self) -> Option<(String, String)> {
        let image = self.terraform_image.as_deref()?;
        // A colon before the last slash belongs to a registry port
        match image.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => Some((name.to_string(), tag.to_string())),
            _ => Some((image.to_string(), "latest".to_string())),
        }
    }
}
