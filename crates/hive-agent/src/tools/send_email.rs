//! `send_email` user-scoped tool (spec §4.5): sends an email via the Brevo
//! transactional email REST API, authenticated with a vault-resolved
//! per-user API key credential.

use std::sync::Arc;

use async_trait::async_trait;
use hive_vault::Vault;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolResult};

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";
const DEFAULT_CREDENTIAL_NAME: &str = "brevo_api_key";

#[derive(Debug, Deserialize)]
struct SendEmailInput {
    to: String,
    subject: String,
    #[serde(rename = "textContent")]
    text_content: String,
    #[serde(rename = "fromName", default)]
    from_name: Option<String>,
    #[serde(rename = "fromEmail", default)]
    from_email: Option<String>,
}

pub struct SendEmailTool {
    user_id: String,
    vault: Arc<Vault>,
}

impl SendEmailTool {
    pub fn new(user_id: impl Into<String>, vault: Arc<Vault>) -> Self {
        Self {
            user_id: user_id.into(),
            vault,
        }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Sends a transactional email via Brevo using the caller's stored API key."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "to": { "type": "string", "description": "Recipient email address." },
                "subject": { "type": "string" },
                "textContent": { "type": "string" },
                "fromName": { "type": "string" },
                "fromEmail": { "type": "string" }
            },
            "required": ["to", "subject", "textContent"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let parsed: SendEmailInput = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let api_key = match self.vault.resolve_by_name(&self.user_id, DEFAULT_CREDENTIAL_NAME) {
            Ok(k) => k,
            Err(e) => return ToolResult::error(format!("no email credential configured: {e}")),
        };

        let from_email = parsed.from_email.unwrap_or_else(|| "assistant@example.com".to_string());
        let from_name = parsed.from_name.unwrap_or_else(|| "Hive".to_string());

        let body = json!({
            "sender": { "name": from_name, "email": from_email },
            "to": [{ "email": parsed.to }],
            "subject": parsed.subject,
            "textContent": parsed.text_content,
        });

        let client = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(15)).build() {
            Ok(c) => c,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let resp = client
            .post(BREVO_SEND_URL)
            .header("api-key", api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                ToolResult::from_json(json!({ "sent": true, "to": parsed.to }))
            }
            Ok(r) => {
                let status = r.status();
                let text = r.text().await.unwrap_or_default();
                ToolResult::error(format!("Brevo send failed with status {status}: {text}"))
            }
            Err(e) => ToolResult::error(format!("Brevo request failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_store::Store;

    #[tokio::test]
    async fn missing_credential_is_reported_as_error() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(Vault::open(dir.path().to_str().unwrap(), store.clone()).unwrap());
        store.ensure_user("alice").unwrap();

        let tool = SendEmailTool::new("alice", vault);
        let result = tool
            .execute(json!({ "to": "x@example.com", "subject": "hi", "textContent": "hello" }))
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("no email credential"));
    }
}
