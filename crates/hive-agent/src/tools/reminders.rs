//! `manage_reminders` user-scoped tool (spec §4.5): add/list/complete/remove
//! reminders and set a due time, all scoped to the calling user.

use std::sync::Arc;

use async_trait::async_trait;
use hive_store::Store;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Add,
    List,
    Complete,
    Remove,
    SetDue,
}

#[derive(Debug, Deserialize)]
struct ManageRemindersInput {
    action: Action,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "dueAt", default)]
    due_at: Option<String>,
    #[serde(default)]
    include_complete: Option<bool>,
}

pub struct RemindersTool {
    user_id: String,
    store: Arc<Store>,
}

impl RemindersTool {
    pub fn new(user_id: impl Into<String>, store: Arc<Store>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

#[async_trait]
impl Tool for RemindersTool {
    fn name(&self) -> &str {
        "manage_reminders"
    }

    fn description(&self) -> &str {
        "Adds, lists, completes, removes, or reschedules reminders for the current user."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["add", "list", "complete", "remove", "set_due"] },
                "text": { "type": "string", "description": "Required for action=add." },
                "id": { "type": "string", "description": "Reminder id; required for complete, remove, set_due." },
                "dueAt": { "type": "string", "description": "ISO-8601 timestamp; used by add and set_due." },
                "include_complete": { "type": "boolean", "description": "For action=list, include completed reminders." }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let parsed: ManageRemindersInput = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        match parsed.action {
            Action::Add => {
                let Some(text) = parsed.text else {
                    return ToolResult::error("text is required for action=add");
                };
                match self.store.add_reminder(&self.user_id, &text, parsed.due_at.as_deref()) {
                    Ok(r) => ToolResult::from_json(serde_json::to_value(r).unwrap_or(json!({}))),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            Action::List => {
                let include_complete = parsed.include_complete.unwrap_or(false);
                match self.store.list_reminders(&self.user_id, include_complete) {
                    Ok(rows) => ToolResult::from_json(json!({ "reminders": rows })),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            Action::Complete => {
                let Some(id) = parsed.id else {
                    return ToolResult::error("id is required for action=complete");
                };
                match self.store.complete_reminder(&self.user_id, &id) {
                    Ok(()) => ToolResult::from_json(json!({ "id": id, "completed": true })),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            Action::Remove => {
                let Some(id) = parsed.id else {
                    return ToolResult::error("id is required for action=remove");
                };
                match self.store.remove_reminder(&self.user_id, &id) {
                    Ok(()) => ToolResult::from_json(json!({ "id": id, "removed": true })),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            Action::SetDue => {
                let (Some(id), Some(due_at)) = (parsed.id, parsed.due_at) else {
                    return ToolResult::error("id and dueAt are required for action=set_due");
                };
                match self.store.set_reminder_due(&self.user_id, &id, &due_at) {
                    Ok(()) => ToolResult::from_json(json!({ "id": id, "dueAt": due_at })),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> RemindersTool {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        RemindersTool::new("alice", store)
    }

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let tool = tool();
        let added = tool.execute(json!({ "action": "add", "text": "call mom" })).await;
        assert!(!added.is_error);

        let listed = tool.execute(json!({ "action": "list" })).await;
        assert!(!listed.is_error);
        assert!(listed.content.contains("call mom"));
    }

    #[tokio::test]
    async fn complete_unknown_id_errors() {
        let tool = tool();
        let result = tool.execute(json!({ "action": "complete", "id": "missing" })).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn add_requires_text() {
        let tool = tool();
        let result = tool.execute(json!({ "action": "add" })).await;
        assert!(result.is_error);
    }
}
