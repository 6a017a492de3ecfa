//! `run_script` user-scoped tool (spec §4.5, §4.11): matches a script by
//! name against the caller's own workspace first, falling back to the
//! `system`-owned shared scripts, and executes it via the Script Runner.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use hive_core::{sanitize_user_id, HiveError, SYSTEM_USER_ID};
use hive_sandbox::ScriptRunner;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolResult};

#[derive(Debug, Deserialize)]
struct RunScriptInput {
    name: String,
    #[serde(default)]
    input: serde_json::Value,
}

pub struct RunScriptTool {
    user_id: String,
    data_dir: PathBuf,
    runner: Arc<ScriptRunner>,
}

impl RunScriptTool {
    pub fn new(user_id: impl Into<String>, data_dir: impl Into<PathBuf>, runner: Arc<ScriptRunner>) -> Self {
        Self {
            user_id: user_id.into(),
            data_dir: data_dir.into(),
            runner,
        }
    }

    fn user_files_dir(&self, user_id: &str) -> PathBuf {
        self.data_dir.join("users").join(sanitize_user_id(user_id)).join("files")
    }

    /// Resolves `name` against the caller's own files first, then the
    /// `system`-owned shared scripts (spec §4.5 "user-owned or
    /// approved-shared scripts").
    fn resolve_script(&self, name: &str) -> Result<(PathBuf, PathBuf), HiveError> {
        let own_dir = self.user_files_dir(&self.user_id);
        let own_path = own_dir.join(name);
        if own_path.is_file() {
            return Ok((own_path, own_dir));
        }

        let shared_dir = self.user_files_dir(SYSTEM_USER_ID);
        let shared_path = shared_dir.join(name);
        if shared_path.is_file() {
            return Ok((shared_path, shared_dir));
        }

        Err(HiveError::NotFound(format!("script \"{name}\" not found")))
    }
}

#[async_trait]
impl Tool for RunScriptTool {
    fn name(&self) -> &str {
        "run_script"
    }

    fn description(&self) -> &str {
        "Runs a named script owned by the current user (or a shared system script) in a sandboxed subprocess with the given JSON input."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Script filename to run." },
                "input": { "type": "object", "description": "JSON object passed to the script's entry point." }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let parsed: RunScriptInput = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let (script_path, cwd) = match self.resolve_script(&parsed.name) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let script_source = match tokio::fs::read_to_string(&script_path).await {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("failed to read script: {e}")),
        };

        match self.runner.run(&script_source, parsed.input, Some(&cwd)).await {
            Ok(output) => {
                if output.success {
                    ToolResult::from_json(output.output)
                } else {
                    ToolResult::error(output.error.unwrap_or_else(|| "script reported an error".to_string()))
                }
            }
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::config::SandboxConfig;

    #[tokio::test]
    async fn missing_script_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptRunner::new(&SandboxConfig::default()));
        let tool = RunScriptTool::new("alice", dir.path(), runner);
        let result = tool.execute(json!({ "name": "nope.js" })).await;
        assert!(result.is_error);
        assert!(result.content.contains("not found"));
    }

    #[tokio::test]
    async fn prefers_user_owned_script_over_shared() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("users").join("alice").join("files");
        let shared_dir = dir.path().join("users").join("system").join("files");
        tokio::fs::create_dir_all(&user_dir).await.unwrap();
        tokio::fs::create_dir_all(&shared_dir).await.unwrap();
        tokio::fs::write(user_dir.join("hello.js"), "module.exports = async () => ({ from: 'user' });")
            .await
            .unwrap();
        tokio::fs::write(shared_dir.join("hello.js"), "module.exports = async () => ({ from: 'shared' });")
            .await
            .unwrap();

        let runner = Arc::new(ScriptRunner::new(&SandboxConfig::default()));
        let tool = RunScriptTool::new("alice", dir.path(), runner);
        let (path, _cwd) = tool.resolve_script("hello.js").unwrap();
        assert_eq!(path, user_dir.join("hello.js"));
    }
}
