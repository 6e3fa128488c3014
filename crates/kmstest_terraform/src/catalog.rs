//! Plan scenarios for the KMS key module.
//!
//! The `complete` fixture turns the alarms feature on, so a full plan adds
//! the key, the alias and the SNS alarms topic. The `defaults` fixture leaves
//! alarms off and only adds key and alias.

use crate::plan::{PlanSummary, NO_CHANGES, WILL_PERFORM_ACTIONS};
use crate::scenario::{Expectation, Scenario, ScenarioSuite};

pub const KMS_KEY_ADDRESS: &str = "module.main.aws_kms_key.main[0]";
pub const KMS_ALIAS_ADDRESS: &str = "module.main.aws_kms_alias.main[0]";
pub const ALARMS_TOPIC_ADDRESS: &str = "module.main.aws_sns_topic.alarms[0]";

pub const COMPLETE_FIXTURE: &str = "complete";
pub const DEFAULTS_FIXTURE: &str = "defaults";

pub const COMPLETE_LABEL: &str = "comp";
pub const DEFAULTS_LABEL: &str = "def";

const WILL_BE_CREATED: &str = "will be created";

/// Complete fixture with the module enabled: key, alias and alarms topic.
pub fn complete_enabled() -> Scenario {
    Scenario::new("complete_enabled", COMPLETE_FIXTURE, COMPLETE_LABEL)
        .var("environment_type", "None")
        .expect(Expectation::NotEmpty)
        .expect(Expectation::Contains(KMS_KEY_ADDRESS.to_string()))
        .expect(Expectation::Contains(KMS_ALIAS_ADDRESS.to_string()))
        .expect(Expectation::Contains(WILL_BE_CREATED.to_string()))
        .expect(Expectation::Contains(ALARMS_TOPIC_ADDRESS.to_string()))
        .expect(Expectation::Summary(PlanSummary::new(3, 0, 0)))
}

/// Complete fixture with `enabled = false`: nothing is planned.
pub fn complete_disabled() -> Scenario {
    Scenario::new("complete_disabled", COMPLETE_FIXTURE, COMPLETE_LABEL)
        .var("enabled", false)
        .var("environment_type", "None")
        .expect(Expectation::NotEmpty)
        .expect(Expectation::Contains(NO_CHANGES.to_string()))
}

/// Defaults fixture smoke test.
pub fn defaults_minimal() -> Scenario {
    Scenario::new("defaults_minimal", DEFAULTS_FIXTURE, DEFAULTS_LABEL)
        .expect(Expectation::NotEmpty)
        .expect(Expectation::Contains(WILL_PERFORM_ACTIONS.to_string()))
}

/// Defaults fixture with exact resources: key and alias, no alarms topic.
pub fn defaults_full() -> Scenario {
    Scenario::new("defaults_full", DEFAULTS_FIXTURE, DEFAULTS_LABEL)
        .expect(Expectation::Contains(KMS_KEY_ADDRESS.to_string()))
        .expect(Expectation::Contains(KMS_ALIAS_ADDRESS.to_string()))
        .expect(Expectation::Contains(WILL_BE_CREATED.to_string()))
        .expect(Expectation::NotContains(ALARMS_TOPIC_ADDRESS.to_string()))
        .expect(Expectation::Summary(PlanSummary::new(2, 0, 0)))
}

/// All four KMS module scenarios.
pub fn kms_module_suite() -> ScenarioSuite {
    ScenarioSuite {
        scenarios: vec![
            complete_enabled(),
            complete_disabled(),
            defaults_minimal(),
            defaults_full(),
        ],
    }
}
