//! Terraform invocation options.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TerraformError, TerraformResult};
use crate::retry::RetryableErrors;

/// Retries applied by [`base_options`].
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Pause between retries applied by [`base_options`].
pub const DEFAULT_TIME_BETWEEN_RETRIES: Duration = Duration::from_secs(5);

/// Everything needed to run terraform once against one fixture directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformOptions {
    /// Directory holding the root module under test
    pub terraform_dir: PathBuf,
    /// Input variables passed with `-var`
    pub vars: BTreeMap<String, Value>,
    /// Extra process environment
    pub env_vars: HashMap<String, String>,
    /// Pass `-no-color`
    pub no_color: bool,
    /// Transient failures eligible for retry
    pub retryable_errors: RetryableErrors,
    pub max_retries: u32,
    #[serde(with = "duration_secs")]
    pub time_between_retries: Duration,
    /// Binary to invoke
    pub terraform_binary: String,
    /// Pass `-lock=true` to plan/apply/destroy
    pub lock: bool,
    /// Values passed with `-backend-config` on init
    pub backend_config: BTreeMap<String, String>,
}

/// Base configuration shared by every scenario.
///
/// Color output is suppressed, the AWS retry table is attached and up to
/// three retries are allowed. The directory is not checked here; callers
/// overlay their own variables and environment.
pub fn base_options(terraform_dir: impl Into<PathBuf>) -> TerraformOptions {
    TerraformOptions {
        terraform_dir: terraform_dir.into(),
        vars: BTreeMap::new(),
        env_vars: HashMap::new(),
        no_color: true,
        retryable_errors: RetryableErrors::aws_defaults(),
        max_retries: DEFAULT_MAX_RETRIES,
        time_between_retries: DEFAULT_TIME_BETWEEN_RETRIES,
        terraform_binary: "terraform".to_string(),
        lock: false,
        backend_config: BTreeMap::new(),
    }
}

impl TerraformOptions {
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_vars(mut self, vars: BTreeMap<String, Value>) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_time_between_retries(mut self, delay: Duration) -> Self {
        self.time_between_retries = delay;
        self
    }

    pub fn with_retryable_errors(mut self, table: RetryableErrors) -> Self {
        self.retryable_errors = table;
        self
    }

    pub fn with_terraform_binary(mut self, binary: impl Into<String>) -> Self {
        self.terraform_binary = binary.into();
        self
    }

    pub fn with_backend_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_config.insert(key.into(), value.into());
        self
    }

    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Check the fixture before any command runs.
    ///
    /// The directory must exist and contain at least one `.tf` file.
    pub fn validate(&self) -> TerraformResult<()> {
        let dir = &self.terraform_dir;
        if !dir.is_dir() {
            return Err(TerraformError::Setup(format!(
                "terraform directory not found: {}",
                dir.display()
            )));
        }

        if !has_tf_files(dir)? {
            return Err(TerraformError::Setup(format!(
                "no .tf files in {}",
                dir.display()
            )));
        }

        for name in self.vars.keys() {
            if name.is_empty() || name.contains(char::is_whitespace) || name.contains('=') {
                return Err(TerraformError::InvalidVariable {
                    name: name.clone(),
                    message: "not a valid terraform identifier".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn has_tf_files(dir: &Path) -> TerraformResult<bool> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*.tf", escaped.trim_end_matches('/'));
    let mut matches = glob::glob(&pattern)
        .map_err(|e| TerraformError::Setup(format!("bad fixture path {}: {}", pattern, e)))?;
    Ok(matches.any(|entry| entry.is_ok()))
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
