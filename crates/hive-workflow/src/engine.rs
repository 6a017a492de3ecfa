//! Workflow Engine (spec §4.7, C8): a deterministic sequential step runner.
//! Grounded on the Scheduler's `WorkflowRunner` seam (spec §9 "cyclic
//! dependency"): the Gateway and notification sender are injected as trait
//! objects constructed before the engine, never called back into during
//! construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use hive_core::{sanitize_user_id, split_channel_prefix, HiveError, Result, SYSTEM_USER_ID};
use hive_sandbox::ScriptRunner;
use hive_store::types::{MessageRole, RunStatus};
use hive_store::Store;
use hive_vault::Vault;
use tracing::warn;

use crate::interpolate::{interpolate, navigate};
use crate::types::{InputMapping, RunOutcomeStatus, StepDefinition, StepResult, StepStatus, WorkflowExecutionResult};

/// Invoked for `skill` steps (spec §4.7): "call the Gateway with
/// `channel=workflow`, `forceSkill=step.skillName`, and `tools=step.tools`".
#[async_trait]
pub trait GatewayCaller: Send + Sync {
    async fn run_skill_step(&self, owner_id: &str, message: &str, skill_name: &str, tools: &[String]) -> Result<String>;
}

/// Delivers one already-chunked piece of a `notify` step's message.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_chunk(&self, channel: &str, recipient: &str, chunk: &str) -> Result<()>;
}

const NOTIFICATION_CHUNK_SIZE: usize = 4096;

/// Splits `message` into chunks no larger than `chunk_size`, preferring to
/// break on a newline boundary (spec §6 "Notification channel").
pub fn chunk_message(message: &str, chunk_size: usize) -> Vec<String> {
    if message.len() <= chunk_size {
        return vec![message.to_string()];
    }
    let mut chunks = Vec::new();
    let mut rest = message;
    while rest.len() > chunk_size {
        let window = &rest[..chunk_size];
        let split_at = window.rfind('\n').unwrap_or(chunk_size);
        let split_at = if split_at == 0 { chunk_size } else { split_at };
        chunks.push(rest[..split_at].to_string());
        rest = rest[split_at..].trim_start_matches('\n');
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

pub struct WorkflowEngine {
    store: Arc<Store>,
    vault: Arc<Vault>,
    script_runner: Arc<ScriptRunner>,
    gateway: Arc<dyn GatewayCaller>,
    notifier: Arc<dyn NotificationSender>,
    data_dir: PathBuf,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<Store>,
        vault: Arc<Vault>,
        script_runner: Arc<ScriptRunner>,
        gateway: Arc<dyn GatewayCaller>,
        notifier: Arc<dyn NotificationSender>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            vault,
            script_runner,
            gateway,
            notifier,
            data_dir: data_dir.into(),
        }
    }

    /// `executeWorkflow(workflowId, callerUserId)` (spec §4.7).
    pub async fn execute_workflow(&self, workflow_id: &str, caller_user_id: &str) -> Result<WorkflowExecutionResult> {
        let workflow = self.store.require_workflow(workflow_id)?;
        let run = self.store.create_run(workflow_id, caller_user_id)?;

        let steps: Vec<StepDefinition> = serde_json::from_str(&workflow.steps_json)
            .map_err(|e| HiveError::Validation(format!("malformed workflow steps: {e}")))?;

        let total_start = Instant::now();
        let mut results: Vec<StepResult> = Vec::new();
        let mut outputs: HashMap<String, serde_json::Value> = HashMap::new();
        let mut halted = false;

        for step in &steps {
            if halted {
                results.push(StepResult {
                    id: step.id().to_string(),
                    status: StepStatus::Skipped,
                    duration_ms: 0,
                    output: None,
                    error: None,
                });
                self.store.update_run_steps(&run.id, &serde_json::to_string(&results)?)?;
                continue;
            }

            let step_start = Instant::now();
            match self.run_step(step, &workflow.owner_id, caller_user_id, &outputs).await {
                Ok(output) => {
                    outputs.insert(step.id().to_string(), output.clone());
                    results.push(StepResult {
                        id: step.id().to_string(),
                        status: StepStatus::Completed,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        output: Some(output),
                        error: None,
                    });
                }
                Err(e) => {
                    results.push(StepResult {
                        id: step.id().to_string(),
                        status: StepStatus::Failed,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        output: None,
                        error: Some(e.to_string()),
                    });
                    halted = true;
                }
            }

            self.store.update_run_steps(&run.id, &serde_json::to_string(&results)?)?;
        }

        let overall_status = if halted { RunOutcomeStatus::Failed } else { RunOutcomeStatus::Completed };
        let run_status = if halted { RunStatus::Failed } else { RunStatus::Completed };
        let error = results.iter().find(|r| r.status == StepStatus::Failed).and_then(|r| r.error.clone());

        self.store.finish_run(
            &run.id,
            run_status,
            &serde_json::to_string(&results)?,
            error.as_deref(),
        )?;

        Ok(WorkflowExecutionResult {
            status: overall_status,
            steps: results,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            error,
        })
    }

    async fn run_step(
        &self,
        step: &StepDefinition,
        owner_id: &str,
        caller_user_id: &str,
        outputs: &HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let resolved = self.resolve_inputs(step.inputs(), owner_id, outputs)?;

        match step {
            StepDefinition::Script { script_id, .. } => self.run_script_step(owner_id, script_id, resolved).await,
            StepDefinition::Skill { skill_name, tools, .. } => {
                self.run_skill_step(owner_id, skill_name, tools, resolved).await
            }
            StepDefinition::Notify { channel, .. } => {
                self.run_notify_step(owner_id, caller_user_id, channel, resolved).await
            }
        }
    }

    /// `static` interpolates `${steps...}` templates; `ref` navigates the
    /// stored outputs map; `credential` decrypts from the vault. A missing
    /// credential is fatal to the step (spec §4.7).
    fn resolve_inputs(
        &self,
        inputs: &HashMap<String, InputMapping>,
        owner_id: &str,
        outputs: &HashMap<String, serde_json::Value>,
    ) -> Result<HashMap<String, serde_json::Value>> {
        let mut resolved = HashMap::new();
        for (key, mapping) in inputs {
            let value = match mapping {
                InputMapping::Static { value } => match value {
                    serde_json::Value::String(s) => serde_json::Value::String(interpolate(s, outputs)?),
                    other => other.clone(),
                },
                InputMapping::Ref { source } => navigate(outputs, source)
                    .ok_or_else(|| HiveError::Validation(format!("no output at \"{source}\"")))?,
                InputMapping::Credential { credential_name } => {
                    let secret = self.vault.resolve_by_name(owner_id, credential_name).map_err(|e| match e {
                        HiveError::NotFound(_) => {
                            HiveError::NotFound(format!("credential \"{credential_name}\" not found"))
                        }
                        other => other,
                    })?;
                    serde_json::Value::String(secret)
                }
            };
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    async fn run_script_step(
        &self,
        owner_id: &str,
        script_id: &str,
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let (script_path, cwd) = resolve_script_path(&self.data_dir, owner_id, script_id)?;
        let script_source = tokio::fs::read_to_string(&script_path).await?;

        let output = self
            .script_runner
            .run(&script_source, serde_json::Value::Object(inputs.into_iter().collect()), Some(&cwd))
            .await?;

        if output.success {
            Ok(output.output)
        } else {
            Err(HiveError::Validation(output.error.unwrap_or_else(|| "script reported an error".to_string())))
        }
    }

    /// Concatenates the `message` input (if any) with the remaining inputs
    /// rendered as human-readable blocks (spec §4.7).
    async fn run_skill_step(
        &self,
        owner_id: &str,
        skill_name: &str,
        tools: &[String],
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(message) = inputs.get("message") {
            if let serde_json::Value::String(s) = message {
                parts.push(s.clone());
            } else {
                parts.push(crate::interpolate::render_for_interpolation(message));
            }
        }
        let mut other_keys: Vec<&String> = inputs.keys().filter(|k| *k != "message").collect();
        other_keys.sort();
        for key in other_keys {
            parts.push(format!("{key}: {}", crate::interpolate::render_for_interpolation(&inputs[key])));
        }
        let message = parts.join("\n\n");

        let response = self.gateway.run_skill_step(owner_id, &message, skill_name, tools).await?;
        Ok(serde_json::Value::String(response))
    }

    /// Recipient resolution tiers (spec §4.7): explicit `recipient` input,
    /// `identityId` lookup owned by the caller, first linked identity for
    /// the channel, then stripping the channel prefix off the caller id.
    async fn run_notify_step(
        &self,
        owner_id: &str,
        caller_user_id: &str,
        channel: &str,
        inputs: HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let recipient = self.resolve_recipient(owner_id, channel, &inputs)?;

        let message = match inputs.get("message") {
            Some(serde_json::Value::Object(map)) => match map.get("response") {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => crate::interpolate::render_for_interpolation(&serde_json::Value::Object(map.clone())),
            },
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => crate::interpolate::render_for_interpolation(other),
            None => return Err(HiveError::Validation("notify step requires a message input".to_string())),
        };

        for chunk in chunk_message(&message, NOTIFICATION_CHUNK_SIZE) {
            self.notifier.send_chunk(channel, &recipient, &chunk).await?;
        }

        let rendered_turn = format!("[Sent via {channel} notification]\n\n{message}");
        self.persist_notification_turn(owner_id, &rendered_turn)?;
        if recipient != owner_id {
            self.persist_notification_turn(&recipient, &rendered_turn)?;
        }

        Ok(serde_json::json!({ "recipient": recipient, "channel": channel, "message": message }))
    }

    fn resolve_recipient(&self, owner_id: &str, channel: &str, inputs: &HashMap<String, serde_json::Value>) -> Result<String> {
        if let Some(serde_json::Value::String(recipient)) = inputs.get("recipient") {
            if !recipient.is_empty() {
                return Ok(recipient.clone());
            }
        }

        if let Some(serde_json::Value::String(identity_id)) = inputs.get("identityId") {
            let identity = self
                .store
                .get_identity(identity_id)?
                .ok_or_else(|| HiveError::NotFound(format!("channel identity {identity_id}")))?;
            if identity.owner_id != owner_id {
                return Err(HiveError::Unauthorized("identity is not owned by the caller".to_string()));
            }
            return Ok(identity.channel_user_id);
        }

        if let Some(identity) = self.store.first_identity_for_channel(owner_id, channel)? {
            return Ok(identity.channel_user_id);
        }

        let (_, bare) = split_channel_prefix(owner_id);
        Ok(bare.to_string())
    }

    fn persist_notification_turn(&self, user_id: &str, text: &str) -> Result<()> {
        let conversation = self.store.open_or_create_conversation(user_id, None)?;
        self.store.append_message(&conversation.id, MessageRole::Assistant, text)?;
        Ok(())
    }
}

/// Resolves a `scriptId` against the caller's own files first, then the
/// `system`-owned shared scripts, mirroring the `run_script` tool's lookup.
fn resolve_script_path(data_dir: &Path, owner_id: &str, script_id: &str) -> Result<(PathBuf, PathBuf)> {
    let own_dir = data_dir.join("users").join(sanitize_user_id(owner_id)).join("files");
    let own_path = own_dir.join(script_id);
    if own_path.is_file() {
        return Ok((own_path, own_dir));
    }

    let shared_dir = data_dir.join("users").join(sanitize_user_id(SYSTEM_USER_ID)).join("files");
    let shared_path = shared_dir.join(script_id);
    if shared_path.is_file() {
        return Ok((shared_path, shared_dir));
    }

    Err(HiveError::NotFound(format!("script \"{script_id}\" not found")))
}

/// Implements the scheduler's `WorkflowRunner` seam so `SchedulerEngine` can
/// drive workflow ticks without depending on this crate directly.
#[async_trait]
impl hive_scheduler::WorkflowRunner for WorkflowEngine {
    async fn run_workflow(&self, owner_id: &str, workflow_id: &str) -> Result<()> {
        let result = self.execute_workflow(workflow_id, owner_id).await?;
        if result.status == RunOutcomeStatus::Failed {
            warn!(workflow_id, error = ?result.error, "scheduled workflow run completed with a failed step");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_message_splits_on_newline_boundary() {
        let message = format!("{}\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = chunk_message(&message, 12);
        assert!(chunks.iter().all(|c| c.len() <= 12));
        assert_eq!(chunks.join("\n").replace("\n\n", "\n"), message.replace("\n\n", "\n"));
    }

    #[test]
    fn chunk_message_under_limit_is_single_chunk() {
        let chunks = chunk_message("short message", 4096);
        assert_eq!(chunks, vec!["short message".to_string()]);
    }

    #[test]
    fn resolve_script_path_prefers_owner_over_shared() {
        let dir = tempfile::tempdir().unwrap();
        let own = dir.path().join("users").join("alice").join("files");
        std::fs::create_dir_all(&own).unwrap();
        std::fs::write(own.join("s.js"), "x").unwrap();
        let (path, _) = resolve_script_path(dir.path(), "alice", "s.js").unwrap();
        assert_eq!(path, own.join("s.js"));
    }

    #[test]
    fn resolve_script_path_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_script_path(dir.path(), "alice", "missing.js");
        assert!(result.is_err());
    }
}
