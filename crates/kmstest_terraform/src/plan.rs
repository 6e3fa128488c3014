//! Parsing of `terraform plan` text output.
//!
//! Assertions mostly work on the raw text, but the resource-count summary and
//! the per-resource change headers are also extracted so reports can show
//! what was planned.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Literal terraform prints when the plan is empty.
pub const NO_CHANGES: &str = "No changes.";

/// Header printed before the list of resource changes.
pub const WILL_PERFORM_ACTIONS: &str = "Terraform will perform the following actions:";

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+) to add, (\d+) to change, (\d+) to destroy").expect("valid regex")
    })
}

fn change_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*# (\S+) (will be created|will be destroyed|will be updated in-place|must be replaced|will be read during apply)",
        )
        .expect("valid regex")
    })
}

fn ansi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid regex"))
}

/// Resource counts from the `Plan:` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub add: u32,
    pub change: u32,
    pub destroy: u32,
}

impl PlanSummary {
    pub fn new(add: u32, change: u32, destroy: u32) -> Self {
        Self {
            add,
            change,
            destroy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add == 0 && self.change == 0 && self.destroy == 0
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.add, self.change, self.destroy
        )
    }
}

/// What terraform intends to do with one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Destroy,
    Update,
    Replace,
    Read,
}

impl ChangeAction {
    fn from_phrase(phrase: &str) -> Option<Self> {
        match phrase {
            "will be created" => Some(Self::Create),
            "will be destroyed" => Some(Self::Destroy),
            "will be updated in-place" => Some(Self::Update),
            "must be replaced" => Some(Self::Replace),
            "will be read during apply" => Some(Self::Read),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    pub action: ChangeAction,
}

/// Parsed `terraform plan` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutput {
    /// Output with ANSI color codes removed
    pub raw: String,
    /// `None` when neither a `Plan:` line nor `No changes.` was found
    pub summary: Option<PlanSummary>,
    pub changes: Vec<ResourceChange>,
}

impl PlanOutput {
    pub fn parse(text: &str) -> Self {
        let raw = ansi_regex().replace_all(text, "").into_owned();

        let summary = match summary_regex().captures(&raw) {
            Some(caps) => {
                let count = |i: usize| caps[i].parse::<u32>().unwrap_or_default();
                Some(PlanSummary::new(count(1), count(2), count(3)))
            }
            None if raw.contains(NO_CHANGES) => Some(PlanSummary::default()),
            None => None,
        };

        let changes = change_regex()
            .captures_iter(&raw)
            .filter_map(|caps| {
                ChangeAction::from_phrase(&caps[2]).map(|action| ResourceChange {
                    address: caps[1].to_string(),
                    action,
                })
            })
            .collect();

        Self {
            raw,
            summary,
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.raw.contains(needle)
    }

    pub fn has_no_changes(&self) -> bool {
        self.raw.contains(NO_CHANGES)
    }

    /// Action planned for `address`, if any.
    pub fn planned(&self, address: &str) -> Option<ChangeAction> {
        self.changes
            .iter()
            .find(|c| c.address == address)
            .map(|c| c.action)
    }

    pub fn addresses_for(&self, action: ChangeAction) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.action == action)
            .map(|c| c.address.as_str())
            .collect()
    }
}

impl fmt::Display for PlanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE_PLAN: &str = r#"
Terraform used the selected providers to generate the following execution
plan. Resource actions are indicated with the following symbols:
  + create

Terraform will perform the following actions:

  # module.main.aws_kms_alias.main[0] will be created
  + resource "aws_kms_alias" "main" {
      + name = "alias/comp-abc1230000"
    }

  # module.main.aws_kms_key.main[0] will be created
  + resource "aws_kms_key" "main" {
      + enable_key_rotation = true
    }

Plan: 2 to add, 0 to change, 0 to destroy.
"#;

    #[test]
    fn test_parse_create_plan() {
        let plan = PlanOutput::parse(CREATE_PLAN);

        assert_eq!(plan.summary, Some(PlanSummary::new(2, 0, 0)));
        assert_eq!(
            plan.planned("module.main.aws_kms_key.main[0]"),
            Some(ChangeAction::Create)
        );
        assert_eq!(plan.addresses_for(ChangeAction::Create).len(), 2);
        assert!(plan.planned("module.main.aws_sns_topic.alarms[0]").is_none());
        assert!(!plan.has_no_changes());
    }

    #[test]
    fn test_parse_no_changes() {
        let plan = PlanOutput::parse(
            "\nNo changes. Your infrastructure matches the configuration.\n",
        );

        assert!(plan.has_no_changes());
        assert_eq!(plan.summary, Some(PlanSummary::default()));
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_parse_mixed_actions_and_import_count() {
        let text = "  # aws_kms_key.old will be destroyed\n  \
                    # aws_kms_alias.main must be replaced\n  \
                    # aws_sns_topic.alarms will be updated in-place\n\
                    Plan: 1 to import, 1 to add, 1 to change, 2 to destroy.\n";
        let plan = PlanOutput::parse(text);

        assert_eq!(plan.summary, Some(PlanSummary::new(1, 1, 2)));
        assert_eq!(plan.planned("aws_kms_key.old"), Some(ChangeAction::Destroy));
        assert_eq!(plan.planned("aws_kms_alias.main"), Some(ChangeAction::Replace));
        assert_eq!(plan.planned("aws_sns_topic.alarms"), Some(ChangeAction::Update));
    }

    #[test]
    fn test_color_codes_are_stripped() {
        let plan = PlanOutput::parse(
            "\u{1b}[1mPlan:\u{1b}[0m 3 to add, 0 to change, 0 to destroy.\n",
        );

        assert_eq!(plan.summary, Some(PlanSummary::new(3, 0, 0)));
        assert!(plan.contains("3 to add, 0 to change, 0 to destroy"));
    }

    #[test]
    fn test_summary_display() {
        assert_eq!(
            PlanSummary::new(3, 0, 0).to_string(),
            "3 to add, 0 to change, 0 to destroy"
        );
    }

    #[test]
    fn test_empty_output() {
        let plan = PlanOutput::parse("  \n");
        assert!(plan.is_empty());
        assert_eq!(plan.summary, None);
    }
}
