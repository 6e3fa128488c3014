//! Command and execution configuration types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single program invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to run (looked up on `PATH` when not absolute)
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory for the process
    pub workdir: Option<PathBuf>,
    /// Extra environment variables, layered over the inherited environment
    pub env: HashMap<String, String>,
}

impl CommandConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &HashMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// The first argument, which for terraform is the subcommand.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Render the invocation for logs, quoting arguments that need it.
    pub fn display(&self) -> String {
        let mut cmd = self.program.clone();
        for arg in &self.args {
            if arg.contains(' ') || arg.contains('"') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push(' ');
                cmd.push_str(arg);
            }
        }
        cmd
    }
}

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Get the CLI command name.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Run the program inside a container instead of on the host.
///
/// The working directory is bind-mounted at `mount_target` and the
/// program's environment is forwarded with `-e`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerWrap {
    pub runtime: ContainerRuntime,
    pub image: String,
    pub tag: String,
    pub mount_target: String,
    /// Host environment variables forwarded by name (e.g. AWS credentials)
    pub passthrough_env: Vec<String>,
}

impl ContainerWrap {
    pub const TERRAFORM_IMAGE: &'static str = "hashicorp/terraform";
    pub const TERRAFORM_TAG: &'static str = "1.6";

    pub fn new(runtime: ContainerRuntime, image: impl Into<String>) -> Self {
        Self {
            runtime,
            image: image.into(),
            tag: "latest".to_string(),
            mount_target: "/workspace".to_string(),
            passthrough_env: Vec::new(),
        }
    }

    /// Terraform image with the AWS credential variables forwarded.
    pub fn terraform(runtime: ContainerRuntime) -> Self {
        Self::new(runtime, Self::TERRAFORM_IMAGE)
            .tag(Self::TERRAFORM_TAG)
            .passthrough([
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "AWS_SESSION_TOKEN",
                "AWS_PROFILE",
                "AWS_REGION",
                "AWS_DEFAULT_REGION",
            ])
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn mount_target(mut self, target: impl Into<String>) -> Self {
        self.mount_target = target.into();
        self
    }

    pub fn passthrough<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passthrough_env.extend(names.into_iter().map(Into::into));
        self
    }

    /// Get the full image name with tag.
    pub fn full_image(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Run configuration with timeouts and log streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Timeout in seconds (0 = no timeout)
    pub timeout_seconds: u64,
    /// Whether to echo output lines as they arrive
    pub stream_logs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 1800, // terraform against a real account can be slow
            stream_logs: false,
        }
    }
}

impl RunConfig {
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Enable or disable log streaming.
    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_config_builder() {
        let config = CommandConfig::new("terraform")
            .args(["plan", "-input=false"])
            .workdir("/tmp/fixture")
            .env("TF_IN_AUTOMATION", "1");

        assert_eq!(config.subcommand(), Some("plan"));
        assert_eq!(config.workdir, Some(PathBuf::from("/tmp/fixture")));
        assert_eq!(config.env.get("TF_IN_AUTOMATION"), Some(&"1".to_string()));
    }

    #[test]
    fn test_display_quotes_spaced_args() {
        let config = CommandConfig::new("terraform")
            .arg("plan")
            .arg("-var")
            .arg("tags={team = \"infra\"}");

        assert_eq!(
            config.display(),
            "terraform plan -var 'tags={team = \"infra\"}'"
        );
    }

    #[test]
    fn test_terraform_container_wrap() {
        let wrap = ContainerWrap::terraform(ContainerRuntime::Podman);

        assert_eq!(wrap.full_image(), "hashicorp/terraform:1.6");
        assert_eq!(wrap.mount_target, "/workspace");
        assert!(wrap.passthrough_env.contains(&"AWS_REGION".to_string()));
    }
}
