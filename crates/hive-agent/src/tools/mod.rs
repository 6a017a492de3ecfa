//! Tool registry (spec §4.5, C6): static and user-scoped tool factories with
//! a uniform call contract (spec §6 "Tool handler ABI").

pub mod fetch_rss;
pub mod fetch_url;
pub mod reminders;
pub mod run_script;
pub mod send_email;
pub mod ssrf;

use async_trait::async_trait;
use hive_provider::ToolDefinition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        Self::success(value.to_string())
    }
}

/// `handler(input: JSON-object) → JSON` (spec §6).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}

/// Static catalog tool names (spec §4.5): always constructible, no per-user
/// state. User-scoped tools (`manage_reminders`, `run_script`, `send_email`)
/// are built per-turn via their own constructors since they close over
/// `{userId, store, scriptRunner}` (spec §4.5).
pub fn static_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(fetch_rss::FetchRssTool::default()),
        Box::new(fetch_url::FetchUrlTool::default()),
    ]
}
