//! Workflow Trigger (spec §4.9, C10): turns a phrase like "run my morning
//! brief" into an authorized workflow execution, with confirmation states
//! for fuzzy matches and per-caller rate limiting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use hive_core::config::TriggerConfig;
use hive_core::{HiveError, Result};
use hive_store::types::Workflow;
use hive_store::Store;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::WorkflowEngine;

const ACCEPT_WORDS: &[&str] = &["yes", "y", "yeah", "yep", "sure", "ok", "go", "do it"];
const CANCEL_WORDS: &[&str] = &["no", "n", "cancel", "nevermind"];

static COURTESY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(hey\s+\w+,?\s*|please\s+|can you\s+|could you\s+|i (?:want|need) to\s+|go ahead and\s+)+")
        .unwrap()
});
static TRIGGER_VERB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(run|execute|trigger|start|launch)\s+").unwrap());
static ARTICLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(my|the|a|an)\s+").unwrap());
static TRAILING_FILLER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(please|now|for me|right now|asap)\s*$").unwrap());
static TRAILING_WORKFLOW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*workflow\s*$").unwrap());
static TOKEN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-_]+").unwrap());

/// Strips leading courtesies, a trigger verb, an article/possessive,
/// trailing fillers, and a trailing "workflow" word (spec §4.9).
pub fn extract_name(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    loop {
        let stripped = COURTESY_RE.replace(&s, "").into_owned();
        if stripped == s {
            break;
        }
        s = stripped;
    }
    s = TRIGGER_VERB_RE.replace(&s, "").into_owned();
    s = ARTICLE_RE.replace(&s, "").into_owned();
    s = TRAILING_FILLER_RE.replace(&s, "").into_owned();
    s = TRAILING_WORKFLOW_RE.replace(&s, "").into_owned();
    s.trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Exact,
    Substring,
    TokenOverlap,
}

#[derive(Debug, Clone)]
struct ScoredMatch {
    workflow: Workflow,
    tier: MatchTier,
    score: f64,
}

fn tokenize(s: &str) -> Vec<String> {
    TOKEN_SPLIT_RE.split(s).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// Scores `name` against every active workflow owned by `owner_id`, sorted
/// by tier then score descending (spec §4.9 "Matching").
fn find_matches(workflows: &[Workflow], name: &str) -> Vec<ScoredMatch> {
    let name_lower = name.to_lowercase();
    let name_tokens = tokenize(&name_lower);

    let mut matches: Vec<ScoredMatch> = Vec::new();
    for workflow in workflows {
        let candidate = workflow.name.to_lowercase();
        if candidate == name_lower {
            matches.push(ScoredMatch { workflow: workflow.clone(), tier: MatchTier::Exact, score: 1.0 });
            continue;
        }
        if candidate.contains(&name_lower) || name_lower.contains(&candidate) {
            matches.push(ScoredMatch { workflow: workflow.clone(), tier: MatchTier::Substring, score: 0.8 });
            continue;
        }
        let candidate_tokens = tokenize(&candidate);
        if candidate_tokens.is_empty() || name_tokens.is_empty() {
            continue;
        }
        let overlap = name_tokens.iter().filter(|t| candidate_tokens.contains(t)).count();
        let denom = name_tokens.len().max(candidate_tokens.len());
        let score = overlap as f64 / denom as f64;
        if score >= 0.5 {
            matches.push(ScoredMatch { workflow: workflow.clone(), tier: MatchTier::TokenOverlap, score });
        }
    }

    matches.sort_by(|a, b| a.tier.cmp(&b.tier).then(b.score.partial_cmp(&a.score).unwrap()));
    matches
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    workflow_id: String,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct PendingAmbiguous {
    workflow_ids: Vec<String>,
    expires_at: Instant,
}

/// Outcome handed back to the Gateway for display; never a raw internal error.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Executed { workflow_name: String, result_summary: String },
    Failed { workflow_name: String, error: String },
    AskedConfirmation { workflow_name: String },
    AskedDisambiguation { candidates: Vec<String> },
    NoMatchInactiveFound { workflow_name: String },
    NoMatchListed { available: Vec<String> },
    Cancelled,
    RateLimited,
    Ignored,
}

pub struct WorkflowTrigger {
    store: Arc<Store>,
    engine: Arc<WorkflowEngine>,
    config: TriggerConfig,
    pending_confirmations: DashMap<String, PendingConfirmation>,
    pending_ambiguous: DashMap<String, PendingAmbiguous>,
    execution_timestamps: DashMap<String, Vec<Instant>>,
}

impl WorkflowTrigger {
    pub fn new(store: Arc<Store>, engine: Arc<WorkflowEngine>, config: TriggerConfig) -> Self {
        Self {
            store,
            engine,
            config,
            pending_confirmations: DashMap::new(),
            pending_ambiguous: DashMap::new(),
            execution_timestamps: DashMap::new(),
        }
    }

    /// Whether this caller has an outstanding confirmation or disambiguation
    /// (unexpired). Lets the Gateway's pre-routing gate (spec §4.6 step 5a)
    /// decide to consult `handle` before running its own trigger-phrase
    /// heuristic, without consuming the pending state itself.
    pub fn has_pending(&self, caller_id: &str) -> bool {
        let now = Instant::now();
        self.pending_confirmations
            .get(caller_id)
            .map(|p| p.expires_at > now)
            .unwrap_or(false)
            || self
                .pending_ambiguous
                .get(caller_id)
                .map(|p| p.expires_at > now)
                .unwrap_or(false)
    }

    /// Entry point for every message the Gateway routes here, whether a
    /// fresh trigger phrase or a reply to a pending confirmation/ambiguity.
    pub async fn handle(&self, caller_id: &str, raw_message: &str) -> Result<TriggerOutcome> {
        if let Some(outcome) = self.try_resolve_pending(caller_id, raw_message).await? {
            return Ok(outcome);
        }

        let name = extract_name(raw_message);
        let workflows = self.store.list_active_workflows_for_owner(caller_id)?;
        let matches = find_matches(&workflows, &name);

        match matches.len() {
            0 => {
                if let Some(inactive) = self.store.find_workflow_by_name(caller_id, &name)? {
                    if !inactive.is_active {
                        return Ok(TriggerOutcome::NoMatchInactiveFound { workflow_name: inactive.name });
                    }
                }
                Ok(TriggerOutcome::NoMatchListed { available: workflows.into_iter().map(|w| w.name).collect() })
            }
            1 => {
                let m = &matches[0];
                if m.tier == MatchTier::Exact {
                    self.execute(caller_id, &m.workflow).await
                } else {
                    self.pending_confirmations.insert(
                        caller_id.to_string(),
                        PendingConfirmation {
                            workflow_id: m.workflow.id.clone(),
                            expires_at: Instant::now() + Duration::from_secs(self.config.confirmation_ttl_secs),
                        },
                    );
                    Ok(TriggerOutcome::AskedConfirmation { workflow_name: m.workflow.name.clone() })
                }
            }
            _ => {
                let ids: Vec<String> = matches.iter().map(|m| m.workflow.id.clone()).collect();
                let names: Vec<String> = matches.iter().map(|m| m.workflow.name.clone()).collect();
                self.pending_ambiguous.insert(
                    caller_id.to_string(),
                    PendingAmbiguous {
                        workflow_ids: ids,
                        expires_at: Instant::now() + Duration::from_secs(self.config.confirmation_ttl_secs),
                    },
                );
                Ok(TriggerOutcome::AskedDisambiguation { candidates: names })
            }
        }
    }

    async fn try_resolve_pending(&self, caller_id: &str, raw_message: &str) -> Result<Option<TriggerOutcome>> {
        let reply = raw_message.trim().to_lowercase();

        if let Some((_, pending)) = self.pending_confirmations.remove(caller_id) {
            if Instant::now() > pending.expires_at {
                return Ok(None);
            }
            if ACCEPT_WORDS.contains(&reply.as_str()) {
                let workflow = self.store.get_workflow(&pending.workflow_id)?;
                return match workflow {
                    Some(w) => Ok(Some(self.execute(caller_id, &w).await?)),
                    None => Ok(Some(TriggerOutcome::Failed {
                        workflow_name: pending.workflow_id,
                        error: "workflow no longer exists".to_string(),
                    })),
                };
            }
            if CANCEL_WORDS.contains(&reply.as_str()) {
                return Ok(Some(TriggerOutcome::Cancelled));
            }
            return Ok(Some(TriggerOutcome::Ignored));
        }

        if let Some((_, pending)) = self.pending_ambiguous.remove(caller_id) {
            if Instant::now() > pending.expires_at {
                return Ok(None);
            }
            if CANCEL_WORDS.contains(&reply.as_str()) {
                return Ok(Some(TriggerOutcome::Cancelled));
            }
            if let Ok(choice) = reply.parse::<usize>() {
                if choice >= 1 && choice <= pending.workflow_ids.len() {
                    let workflow = self.store.get_workflow(&pending.workflow_ids[choice - 1])?;
                    return match workflow {
                        Some(w) => Ok(Some(self.execute(caller_id, &w).await?)),
                        None => Ok(Some(TriggerOutcome::Failed {
                            workflow_name: pending.workflow_ids[choice - 1].clone(),
                            error: "workflow no longer exists".to_string(),
                        })),
                    };
                }
            }
            return Ok(Some(TriggerOutcome::Ignored));
        }

        Ok(None)
    }

    /// Authorization + sliding rate limit, then dispatch to the engine
    /// (spec §4.9 "Authorization + rate limit").
    async fn execute(&self, caller_id: &str, workflow: &Workflow) -> Result<TriggerOutcome> {
        if workflow.owner_id != caller_id {
            return Err(HiveError::Unauthorized("workflow is not owned by the caller".to_string()));
        }

        if !self.allow_execution(caller_id) {
            return Ok(TriggerOutcome::RateLimited);
        }

        match self.engine.execute_workflow(&workflow.id, caller_id).await {
            Ok(result) => Ok(TriggerOutcome::Executed {
                workflow_name: workflow.name.clone(),
                result_summary: format!("{} step(s), status: {:?}", result.steps.len(), result.status),
            }),
            Err(e) => Ok(TriggerOutcome::Failed { workflow_name: workflow.name.clone(), error: e.to_string() }),
        }
    }

    /// Sliding 60-second window, max 3 executions per caller (spec §4.9).
    fn allow_execution(&self, caller_id: &str) -> bool {
        let window = Duration::from_secs(self.config.rate_limit_window_secs);
        let now = Instant::now();
        let mut entry = self.execution_timestamps.entry(caller_id.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < window);
        if entry.len() as u32 >= self.config.rate_limit_max {
            return false;
        }
        entry.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_name_strips_courtesy_verb_article_and_trailing_filler() {
        assert_eq!(extract_name("Hey Hive, please run my morning brief now"), "morning brief");
    }

    #[test]
    fn extract_name_strips_trailing_workflow_word() {
        assert_eq!(extract_name("start the backup workflow"), "backup");
    }

    #[test]
    fn extract_name_handles_bare_phrase() {
        assert_eq!(extract_name("could you execute daily report for me"), "daily report");
    }

    fn workflow(name: &str) -> Workflow {
        Workflow {
            id: format!("id-{name}"),
            owner_id: "alice".to_string(),
            name: name.to_string(),
            steps_json: "[]".to_string(),
            is_active: true,
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        }
    }

    #[test]
    fn exact_match_scores_one() {
        let workflows = vec![workflow("morning brief"), workflow("backup")];
        let matches = find_matches(&workflows, "morning brief");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Exact);
        assert_eq!(matches[0].score, 1.0);
    }

    #[test]
    fn substring_match_scores_point_eight() {
        let workflows = vec![workflow("weekly backup report")];
        let matches = find_matches(&workflows, "backup");
        assert_eq!(matches[0].tier, MatchTier::Substring);
        assert_eq!(matches[0].score, 0.8);
    }

    #[test]
    fn token_overlap_below_half_is_not_a_match() {
        let workflows = vec![workflow("alpha beta gamma delta")];
        let matches = find_matches(&workflows, "alpha zeta");
        assert!(matches.is_empty());
    }

    #[test]
    fn token_overlap_at_half_matches() {
        let workflows = vec![workflow("morning brief")];
        let matches = find_matches(&workflows, "morning update");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::TokenOverlap);
    }

    #[test]
    fn rate_limit_allows_three_then_blocks() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let vault_dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(hive_vault::Vault::open(vault_dir.path().to_str().unwrap(), store.clone()).unwrap());
        let sandbox_config = hive_core::config::SandboxConfig::default();
        let runner = Arc::new(hive_sandbox::ScriptRunner::new(&sandbox_config));

        struct NoopGateway;
        #[async_trait::async_trait]
        impl crate::engine::GatewayCaller for NoopGateway {
            async fn run_skill_step(&self, _: &str, _: &str, _: &str, _: &[String]) -> Result<String> {
                Ok(String::new())
            }
        }
        struct NoopNotifier;
        #[async_trait::async_trait]
        impl crate::engine::NotificationSender for NoopNotifier {
            async fn send_chunk(&self, _: &str, _: &str, _: &str) -> Result<()> {
                Ok(())
            }
        }

        let data_dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            vault,
            runner,
            Arc::new(NoopGateway),
            Arc::new(NoopNotifier),
            data_dir.path(),
        ));
        let trigger = WorkflowTrigger::new(store, engine, TriggerConfig::default());

        assert!(trigger.allow_execution("alice"));
        assert!(trigger.allow_execution("alice"));
        assert!(trigger.allow_execution("alice"));
        assert!(!trigger.allow_execution("alice"));
    }
}
