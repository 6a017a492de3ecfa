//! Gateway (spec §4.6, C7): the per-message state machine — resolve
//! identity, load history, route, build context, execute, persist — laid
//! out as the 16 numbered steps below.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::warn;

use hive_agent::orchestrator::HistoryTurn as RoutingHistoryTurn;
use hive_agent::tools::reminders::RemindersTool;
use hive_agent::tools::run_script::RunScriptTool;
use hive_agent::tools::send_email::SendEmailTool;
use hive_agent::{
    static_tools, to_definitions, BuildInput, ContextBuilder, ExecuteOptions, Executor, HistoryTurn, Intent, Orchestrator,
    PersonalityLevel, RoutingDecision, SkillSummary, Tool,
};
use hive_core::config::HiveConfig;
use hive_core::{Channel, ModelTier, Result};
use hive_provider::{LlmProvider, Role};
use hive_sandbox::ScriptRunner;
use hive_store::types::{Message as StoredMessage, MessageRole};
use hive_store::Store;
use hive_vault::Vault;
use hive_workflow::engine::GatewayCaller;
use hive_workflow::{TriggerOutcome, WorkflowTrigger};

use crate::{identity, overrides, skills::SkillResolver};

const ASSISTANT_NAME: &str = "Hive";
const ESTIMATED_TOKEN_BUDGET: u32 = 2500;

/// Local pre-routing gate (spec §4.6 step 5b): explicit trigger/listing
/// phrases, matched before the Orchestrator ever runs. Mirrors the verb set
/// `hive_workflow::trigger::extract_name` strips, plus a "list workflows"
/// phrasing the trigger's own matcher never needs to recognize.
static WORKFLOW_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:hey\s+\w+,?\s*|please\s+|can you\s+|could you\s+|i (?:want|need) to\s+|go ahead and\s+)*(run|execute|trigger|start|launch)\s+(my|the|a|an)?\s*[\w\s-]+(workflow)?\s*$|(?i)^\s*(list|show)\s+(my\s+)?workflows?\s*$").unwrap()
});

/// Per-turn options a caller can supply (spec §4.6 steps 8, 13).
#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
    /// Overrides the Orchestrator's `selectedSkill`, also written back onto
    /// the returned routing decision (spec §4.6 step 8).
    pub force_skill: Option<String>,
    /// Tool names to union with the always-on default set (spec §4.5
    /// "Context injection").
    pub tools: Vec<String>,
}

/// One incoming `(rawUserId, message, channel, conversationId?, options?)`
/// call (spec §4.6).
#[derive(Debug, Clone)]
pub struct MessageInput {
    pub raw_user_id: String,
    pub message: String,
    pub channel: Channel,
    pub conversation_id: Option<String>,
    pub options: GatewayOptions,
}

/// What step 15 hands back to the caller.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub content: String,
    pub routing: RoutingDecision,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_cents: f64,
    pub estimated_tokens_saved: u32,
}

/// The Gateway's state machine (C7). Holds every other subsystem it
/// orchestrates; the `trigger` field is bound after construction to resolve
/// the Gateway⇄WorkflowTrigger cycle (spec §9).
pub struct Gateway {
    store: Arc<Store>,
    vault: Arc<Vault>,
    data_dir: PathBuf,
    config: HiveConfig,
    orchestrator: Orchestrator,
    executor_provider: Arc<dyn LlmProvider>,
    sandbox: Arc<ScriptRunner>,
    skills: SkillResolver,
    trigger: OnceCell<Arc<WorkflowTrigger>>,
}

impl Gateway {
    pub fn new(
        store: Arc<Store>,
        vault: Arc<Vault>,
        data_dir: impl Into<PathBuf>,
        config: HiveConfig,
        orchestrator: Orchestrator,
        executor_provider: Arc<dyn LlmProvider>,
        sandbox: Arc<ScriptRunner>,
    ) -> Arc<Self> {
        let data_dir = data_dir.into();
        let skills = SkillResolver::new(store.clone(), data_dir.clone());
        Arc::new(Self {
            store,
            vault,
            data_dir,
            config,
            orchestrator,
            executor_provider,
            sandbox,
            skills,
            trigger: OnceCell::new(),
        })
    }

    /// Binds the `WorkflowTrigger` built on top of this Gateway (spec §9:
    /// "constructing the trigger with the engine, then binding the trigger
    /// into the Gateway through a setter"). Composition-root-only; a second
    /// call is a programming error.
    pub fn set_trigger(&self, trigger: Arc<WorkflowTrigger>) {
        self.trigger
            .set(trigger)
            .unwrap_or_else(|_| panic!("Gateway::set_trigger called more than once"));
    }

    fn trigger(&self) -> &Arc<WorkflowTrigger> {
        self.trigger.get().expect("Gateway::set_trigger must run before the first process() call")
    }

    /// The full 16-step state machine (spec §4.6).
    pub async fn process(&self, input: MessageInput) -> Result<GatewayResponse> {
        // 1. Resolve identity.
        let owner_id = identity::resolve_user_id(&self.store, &self.data_dir, &input.raw_user_id)?;

        // 2. Open conversation.
        let conversation = self.store.open_or_create_conversation(&owner_id, input.conversation_id.as_deref())?;

        // 3. Persist user turn immediately.
        self.store.append_message(&conversation.id, MessageRole::User, &input.message)?;

        // 4. Load history: last 20, user/assistant only, sliced to last 10.
        let raw_history = self.store.recent_messages(&conversation.id, 20)?;
        let history: Vec<StoredMessage> = raw_history
            .into_iter()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .collect();
        let history = tail(&history, 10);

        // 5a. Pending confirmation/disambiguation short-circuits everything.
        if self.trigger().has_pending(&owner_id) {
            let outcome = self.trigger().handle(&owner_id, &input.message).await?;
            return self.respond_from_trigger(&conversation.id, outcome);
        }

        // 5b. Local trigger/listing phrase heuristic.
        if WORKFLOW_PHRASE_RE.is_match(&input.message) {
            let outcome = self.trigger().handle(&owner_id, &input.message).await?;
            return self.respond_from_trigger(&conversation.id, outcome);
        }

        // 6. Route: last 5 turns only.
        let routing_history: Vec<RoutingHistoryTurn> = tail(&history, 5)
            .iter()
            .map(|m| RoutingHistoryTurn { role: m.role.as_str().to_string(), content: m.content.clone() })
            .collect();
        let available_skills: Vec<SkillSummary> = self.skills.summaries(&owner_id)?;
        let mut routing = self.orchestrator.route(&input.message, &routing_history, &available_skills).await;

        // 7. Post-routing workflow gate.
        if routing.intent == Intent::WorkflowTrigger {
            let outcome = self.trigger().handle(&owner_id, &input.message).await?;
            return self.respond_from_trigger(&conversation.id, outcome);
        }

        // 8. Load skill: forceSkill overrides the orchestrator's choice.
        if let Some(forced) = &input.options.force_skill {
            routing.selected_skill = Some(forced.clone());
        }
        let skill_content = match &routing.selected_skill {
            Some(name) => self.skills.resolve(&owner_id, name)?,
            None => None,
        };

        // 9. Inject stored summary if the orchestrator produced none.
        let conversation_summary = if routing.context_summary.is_none() {
            conversation.summary.clone()
        } else {
            None
        };

        // 10. Compose overrides (soul/identity/profile + fileContext).
        let needs_file_context = routing.intent == Intent::FileOperation;
        let turn_overrides = overrides::compose(&self.store, &owner_id, needs_file_context)?;
        let timezone = overrides::timezone(&self.store, &owner_id)?;

        // 12. Resolve the model (and its tier) before tool assembly, since
        // both the context builder's tool-policy block and the Executor
        // need to know which tools are active.
        let tool_names = default_tool_names(&input.options.tools);
        let tool_impls = self.build_tools(&owner_id, &tool_names);
        let tool_defs = to_definitions(&tool_impls);

        // 11. Build context.
        let context_history: Vec<HistoryTurn> = history
            .iter()
            .map(|m| HistoryTurn { role: to_provider_role(m.role), content: m.content.clone() })
            .collect();
        let build_input = BuildInput {
            routing: &routing,
            user_message: &input.message,
            prior_turns: &context_history,
            skill_content: skill_content.as_deref(),
            overrides: &turn_overrides,
            active_tool_names: &tool_names,
            conversation_summary: conversation_summary.as_deref(),
            timezone: &timezone,
            assistant_name: ASSISTANT_NAME,
        };
        let built = ContextBuilder::build(&build_input);

        let tier = hive_agent::orchestrator::tier_for_complexity(hive_agent::orchestrator::effective_complexity(&routing));
        let model_id = hive_agent::resolve_model(&self.config.executor, &routing);

        // 13. Execute.
        let executor = Executor::new(self.executor_provider.as_ref());
        let options = ExecuteOptions {
            system_prompt: built.system_prompt,
            max_tokens: 1024,
            temperature: None,
            tools: tool_defs,
            max_tool_rounds: self.config.executor.max_tool_rounds,
        };
        let outcome = executor.execute(built.messages, &model_id, tier, options, &tool_impls).await?;

        // 14. Persist assistant turn, log usage, fire-and-forget summarize.
        self.store.append_message(&conversation.id, MessageRole::Assistant, &outcome.content)?;
        self.store.log_usage(&owner_id, &outcome.model_id, outcome.tokens_in, outcome.tokens_out, outcome.cost_cents)?;
        hive_agent::summarizer::spawn_fire_and_forget(
            self.store.clone(),
            self.executor_provider.clone(),
            model_id.clone(),
            conversation.id.clone(),
        );

        // 15. Return.
        let estimated_tokens_saved = ESTIMATED_TOKEN_BUDGET.saturating_sub(built.estimated_tokens);
        let response = GatewayResponse {
            content: outcome.content,
            routing,
            model: outcome.model_id,
            tokens_in: outcome.tokens_in,
            tokens_out: outcome.tokens_out,
            cost_cents: outcome.cost_cents,
            estimated_tokens_saved,
        };

        // 16. Debug log, fire-and-forget.
        if self.config.debug.enabled {
            let payload = serde_json::json!({
                "rawUserId": input.raw_user_id,
                "message": input.message,
                "response": response.content,
                "model": response.model,
                "tokensIn": response.tokens_in,
                "tokensOut": response.tokens_out,
            });
            if let Err(e) = self.store.append_debug_log(&owner_id, &conversation.id, &payload) {
                warn!(error = %e, "debug log append failed, continuing");
            }
        }

        Ok(response)
    }

    fn respond_from_trigger(&self, _conversation_id: &str, outcome: TriggerOutcome) -> Result<GatewayResponse> {
        let content = render_trigger_outcome(&outcome);
        let routing = RoutingDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::WorkflowTrigger,
            complexity: hive_agent::orchestrator::Complexity::Simple,
            suggested_model: ModelTier::Haiku,
            personality_level: PersonalityLevel::None,
            include_bio: false,
            bio_sections: Vec::new(),
        };
        Ok(GatewayResponse {
            content,
            routing,
            model: "none".to_string(),
            tokens_in: 0,
            tokens_out: 0,
            cost_cents: 0.0,
            estimated_tokens_saved: ESTIMATED_TOKEN_BUDGET,
        })
    }

    /// Builds the per-turn tool set: `manage_reminders` and `run_script` are
    /// always present; everything else is opt-in by name (spec §4.5).
    fn build_tools(&self, owner_id: &str, tool_names: &[String]) -> Vec<Box<dyn Tool>> {
        let mut available: Vec<Box<dyn Tool>> = vec![
            Box::new(RemindersTool::new(owner_id, self.store.clone())),
            Box::new(RunScriptTool::new(owner_id, self.data_dir.clone(), self.sandbox.clone())),
            Box::new(SendEmailTool::new(owner_id, self.vault.clone())),
        ];
        available.extend(static_tools());
        available.retain(|t| tool_names.iter().any(|n| n == t.name()));
        available
    }
}

#[async_trait]
impl GatewayCaller for Gateway {
    /// Invoked by `hive_workflow::WorkflowEngine` for `skill` steps (spec
    /// §4.7): "call the Gateway with `channel=workflow`,
    /// `forceSkill=step.skillName`, and `tools=step.tools`".
    async fn run_skill_step(&self, owner_id: &str, message: &str, skill_name: &str, tools: &[String]) -> Result<String> {
        let response = self
            .process(MessageInput {
                raw_user_id: owner_id.to_string(),
                message: message.to_string(),
                channel: Channel::Workflow,
                conversation_id: None,
                options: GatewayOptions { force_skill: Some(skill_name.to_string()), tools: tools.to_vec() },
            })
            .await?;
        Ok(response.content)
    }
}

fn tail(messages: &[StoredMessage], n: usize) -> Vec<StoredMessage> {
    let start = messages.len().saturating_sub(n);
    messages[start..].to_vec()
}

fn to_provider_role(role: MessageRole) -> Role {
    match role {
        MessageRole::User => Role::User,
        MessageRole::Assistant => Role::Assistant,
        MessageRole::System => Role::System,
    }
}

/// `manage_reminders`/`run_script` always on, union with caller-supplied
/// tool names (spec §4.5 "Context injection").
fn default_tool_names(requested: &[String]) -> Vec<String> {
    let mut names = vec!["manage_reminders".to_string(), "run_script".to_string()];
    for name in requested {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

fn render_trigger_outcome(outcome: &TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::Executed { workflow_name, result_summary } => {
            format!("Ran \"{workflow_name}\": {result_summary}")
        }
        TriggerOutcome::Failed { workflow_name, error } => format!("\"{workflow_name}\" failed: {error}"),
        TriggerOutcome::AskedConfirmation { workflow_name } => {
            format!("Did you mean to run \"{workflow_name}\"? Reply yes to confirm.")
        }
        TriggerOutcome::AskedDisambiguation { candidates } => {
            format!("Which one did you mean: {}?", candidates.join(", "))
        }
        TriggerOutcome::NoMatchInactiveFound { workflow_name } => {
            format!("\"{workflow_name}\" exists but isn't active.")
        }
        TriggerOutcome::NoMatchListed { available } => {
            if available.is_empty() {
                "You don't have any workflows yet.".to_string()
            } else {
                format!("I couldn't find that workflow. You have: {}.", available.join(", "))
            }
        }
        TriggerOutcome::Cancelled => "Okay, cancelled.".to_string(),
        TriggerOutcome::RateLimited => "You've run workflows too many times in the last minute — try again shortly.".to_string(),
        TriggerOutcome::Ignored => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tool_names_always_includes_manage_reminders_and_run_script() {
        let names = default_tool_names(&["fetch_rss".to_string()]);
        assert!(names.contains(&"manage_reminders".to_string()));
        assert!(names.contains(&"run_script".to_string()));
        assert!(names.contains(&"fetch_rss".to_string()));
    }

    #[test]
    fn default_tool_names_dedupes_explicit_requests() {
        let names = default_tool_names(&["run_script".to_string()]);
        assert_eq!(names.iter().filter(|n| *n == "run_script").count(), 1);
    }

    #[test]
    fn workflow_phrase_matches_common_trigger_wording() {
        assert!(WORKFLOW_PHRASE_RE.is_match("run my morning brief"));
        assert!(WORKFLOW_PHRASE_RE.is_match("please run the daily digest workflow"));
        assert!(WORKFLOW_PHRASE_RE.is_match("list my workflows"));
        assert!(!WORKFLOW_PHRASE_RE.is_match("what's the weather like"));
    }
}
