//! Sandboxed script runner (spec §4.11, C12): runs a user-supplied script in
//! an isolated subprocess with JSON IO and a size cap.
//!
//! Each invocation gets a fresh temp directory holding `input.json`, the
//! script source, and the fixed runner harness; the harness writes exactly
//! one `output.json`, which is read back and the temp dir is always removed
//! afterward, success or failure.

use std::path::Path;
use std::time::Duration;

use hive_core::config::SandboxConfig;
use hive_core::{HiveError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const HARNESS_JS: &str = include_str!("harness.js");

/// Outcome of a script run. A runner-reported `__error` key converts into
/// `success=false` rather than a Rust-level error (spec §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub success: bool,
    pub output: serde_json::Value,
    pub error: Option<String>,
}

pub struct ScriptRunner {
    interpreter: String,
    timeout: Duration,
    max_output_bytes: usize,
    max_stderr_bytes: usize,
}

impl ScriptRunner {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
            max_stderr_bytes: config.max_stderr_bytes,
        }
    }

    /// Runs `script_source` with `input` as its entry-point argument.
    /// `cwd` is the working directory the script itself sees (spec §4.7:
    /// `cwd = <user workspace>/files` for workflow script steps); the temp
    /// IO files live in a separate scratch directory regardless.
    pub async fn run(
        &self,
        script_source: &str,
        input: serde_json::Value,
        cwd: Option<&Path>,
    ) -> Result<ScriptOutput> {
        let dir = std::env::temp_dir().join(format!("hive-script-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;

        let result = self.run_in_dir(&dir, script_source, input, cwd).await;

        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove script temp dir");
        }

        result
    }

    async fn run_in_dir(
        &self,
        dir: &Path,
        script_source: &str,
        input: serde_json::Value,
        cwd: Option<&Path>,
    ) -> Result<ScriptOutput> {
        let input_path = dir.join("input.json");
        let script_path = dir.join("script.js");
        let harness_path = dir.join("harness.js");
        let output_path = dir.join("output.json");

        std::fs::write(&input_path, serde_json::to_vec(&input)?)?;
        std::fs::write(&script_path, script_source)?;
        std::fs::write(&harness_path, HARNESS_JS)?;

        let work_dir = cwd.unwrap_or(dir);
        if !work_dir.exists() {
            std::fs::create_dir_all(work_dir)?;
        }

        let mut cmd = tokio::process::Command::new(&self.interpreter);
        cmd.arg(&harness_path)
            .arg(&script_path)
            .arg(&input_path)
            .arg(&output_path)
            .current_dir(work_dir)
            .kill_on_drop(true);

        let run = cmd.output();
        let output = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => return Err(HiveError::Timeout(self.timeout.as_millis() as u64)),
            Ok(Err(e)) => {
                return Err(HiveError::Transport(format!(
                    "failed to launch script interpreter: {e}"
                )))
            }
            Ok(Ok(out)) => out,
        };

        let mut stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if stderr.len() > self.max_stderr_bytes {
            stderr.truncate(self.max_stderr_bytes);
            stderr.push_str("… [truncated]");
        }

        if !output.status.success() {
            return Err(HiveError::Transport(format!(
                "script exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr
            )));
        }

        let raw = std::fs::read(&output_path)
            .map_err(|e| HiveError::Transport(format!("script did not produce output.json: {e}")))?;
        if raw.len() > self.max_output_bytes {
            return Err(HiveError::Validation(format!(
                "script output exceeded {} byte cap",
                self.max_output_bytes
            )));
        }

        let value: serde_json::Value = serde_json::from_slice(&raw)?;
        Ok(interpret_output(value))
    }
}

fn interpret_output(value: serde_json::Value) -> ScriptOutput {
    if let Some(err) = value.get("__error").and_then(|v| v.as_str()) {
        return ScriptOutput {
            success: false,
            output: serde_json::Value::Null,
            error: Some(err.to_string()),
        };
    }
    ScriptOutput {
        success: true,
        output: value,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_sentinel_becomes_failure() {
        let out = interpret_output(serde_json::json!({ "__error": "boom" }));
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("boom"));
    }

    #[test]
    fn plain_value_is_success() {
        let out = interpret_output(serde_json::json!({ "count": 3 }));
        assert!(out.success);
        assert_eq!(out.output["count"], 3);
        assert!(out.error.is_none());
    }

    // Exercises the real subprocess path end-to-end. Requires `node` on
    // PATH; skipped in environments without it (e.g. this repo's CI sandbox).
    #[tokio::test]
    #[ignore]
    async fn runs_a_script_end_to_end() {
        let config = SandboxConfig::default();
        let runner = ScriptRunner::new(&config);
        let script = "module.exports = async (input) => ({ doubled: input.n * 2 });";
        let out = runner
            .run(script, serde_json::json!({ "n": 21 }), None)
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.output["doubled"], 42);
    }

    #[tokio::test]
    #[ignore]
    async fn thrown_error_is_reported_as_failure() {
        let config = SandboxConfig::default();
        let runner = ScriptRunner::new(&config);
        let script = "module.exports = async () => { throw new Error('nope'); };";
        let out = runner.run(script, serde_json::json!({}), None).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("nope"));
    }

    #[tokio::test]
    #[ignore]
    async fn timeout_is_enforced() {
        let mut config = SandboxConfig::default();
        config.timeout_secs = 1;
        let runner = ScriptRunner::new(&config);
        let script = "module.exports = async () => { while (true) {} };";
        let result = runner.run(script, serde_json::json!({}), None).await;
        assert!(matches!(result, Err(HiveError::Timeout(_))));
    }
}
