//! Wire/on-disk workflow step shapes (spec §6 "Workflow step JSON"):
//! `StepDefinition` is a tagged variant over `{script, skill, notify}` so
//! adding a step type is a new variant and dispatcher, never a shared class
//! hierarchy (spec §9).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputMapping {
    Static { value: serde_json::Value },
    Ref { source: String },
    Credential {
        #[serde(rename = "credentialName")]
        credential_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepDefinition {
    Script {
        id: String,
        #[serde(rename = "scriptId")]
        script_id: String,
        inputs: HashMap<String, InputMapping>,
    },
    Skill {
        id: String,
        #[serde(rename = "skillName")]
        skill_name: String,
        #[serde(default)]
        tools: Vec<String>,
        inputs: HashMap<String, InputMapping>,
    },
    Notify {
        id: String,
        channel: String,
        #[serde(default)]
        label: Option<String>,
        inputs: HashMap<String, InputMapping>,
    },
}

impl StepDefinition {
    pub fn id(&self) -> &str {
        match self {
            StepDefinition::Script { id, .. } => id,
            StepDefinition::Skill { id, .. } => id,
            StepDefinition::Notify { id, .. } => id,
        }
    }

    pub fn inputs(&self) -> &HashMap<String, InputMapping> {
        match self {
            StepDefinition::Script { inputs, .. } => inputs,
            StepDefinition::Skill { inputs, .. } => inputs,
            StepDefinition::Notify { inputs, .. } => inputs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub id: String,
    pub status: StepStatus,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcomeStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub status: RunOutcomeStatus,
    pub steps: Vec<StepResult>,
    #[serde(rename = "totalDurationMs")]
    pub total_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_definition_round_trips_through_json() {
        let json = serde_json::json!({
            "id": "s1",
            "type": "script",
            "scriptId": "report.js",
            "inputs": {
                "count": { "type": "static", "value": 3 },
                "token": { "type": "credential", "credentialName": "github_token" }
            }
        });
        let step: StepDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(step.id(), "s1");
        assert_eq!(step.inputs().len(), 2);
        match step {
            StepDefinition::Script { script_id, .. } => assert_eq!(script_id, "report.js"),
            _ => panic!("expected script step"),
        }
    }

    #[test]
    fn notify_step_parses_with_optional_label() {
        let json = serde_json::json!({
            "id": "s2",
            "type": "notify",
            "channel": "telegram",
            "inputs": { "message": { "type": "static", "value": "hi" } }
        });
        let step: StepDefinition = serde_json::from_value(json).unwrap();
        match step {
            StepDefinition::Notify { channel, label, .. } => {
                assert_eq!(channel, "telegram");
                assert!(label.is_none());
            }
            _ => panic!("expected notify step"),
        }
    }
}
