//! Orchestrator (spec §4.1, C2): a small-model classifier that emits a
//! structured `RoutingDecision`, with a fallback provider and a deterministic
//! heuristic safety net. Orchestrator failures never propagate out of the
//! Gateway — the heuristic is always returnable.

use std::sync::Arc;

use hive_core::config::ExecutorConfig;
use hive_core::ModelTier;
use hive_provider::{ChatRequest, LlmProvider, Message, Role};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classified purpose of a message (spec §4.1, Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TaskQuery,
    FileOperation,
    Conversation,
    Creative,
    Code,
    Analysis,
    Greeting,
    Briefing,
    WorkflowTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityLevel {
    Full,
    Minimal,
    None,
}

/// A turn of conversation history as handed to the Orchestrator prompt.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub selected_skill: Option<String>,
    pub context_summary: Option<String>,
    pub intent: Intent,
    pub complexity: Complexity,
    pub suggested_model: ModelTier,
    pub personality_level: PersonalityLevel,
    pub include_bio: bool,
    pub bio_sections: Vec<String>,
}

impl RoutingDecision {
    fn from_raw(raw: RawDecision) -> Self {
        let (personality_level, include_bio, bio_sections) = enrich(raw.intent);
        Self {
            selected_skill: raw.selected_skill,
            context_summary: raw.context_summary,
            intent: raw.intent,
            complexity: raw.complexity,
            suggested_model: raw.suggested_model,
            personality_level,
            include_bio,
            bio_sections,
        }
    }
}

/// What the LLM is actually asked to produce; personality/bio are derived
/// deterministically afterward via the enrichment table, not trusted from
/// the model (spec §4.1 "Enrichment").
#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    selected_skill: Option<String>,
    #[serde(default)]
    context_summary: Option<String>,
    intent: Intent,
    complexity: Complexity,
    suggested_model: ModelTier,
}

/// Intent → (personality, includeBio, bioSections) defaults (spec §4.1).
/// `workflow_trigger` is not named in the source table; the Gateway never
/// reaches the Context Builder for that intent (it short-circuits to the
/// Workflow Trigger), so it's given the same conservative default as
/// `file_operation` — see DESIGN.md Open Question.
fn enrich(intent: Intent) -> (PersonalityLevel, bool, Vec<String>) {
    match intent {
        Intent::Greeting | Intent::Conversation => (PersonalityLevel::Full, false, vec![]),
        Intent::Briefing => (
            PersonalityLevel::Minimal,
            true,
            vec!["professional".to_string(), "current_projects".to_string()],
        ),
        Intent::TaskQuery | Intent::Code | Intent::Analysis => (
            PersonalityLevel::Minimal,
            true,
            vec!["professional".to_string()],
        ),
        Intent::Creative => (PersonalityLevel::Full, false, vec![]),
        Intent::FileOperation | Intent::WorkflowTrigger => (PersonalityLevel::None, false, vec![]),
    }
}

/// Intents that promote a `simple` complexity reading up to `medium`
/// (spec §4.6 step 12).
const PROMOTE_INTENTS: &[Intent] = &[
    Intent::Code,
    Intent::Analysis,
    Intent::Creative,
    Intent::Briefing,
    Intent::FileOperation,
    Intent::TaskQuery,
];

/// The complexity reading the Gateway actually acts on, after the step-12
/// promotion (spec §4.6 step 12): a `simple` reading on one of the
/// `PROMOTE_INTENTS` is promoted to `medium`.
pub fn effective_complexity(routing: &RoutingDecision) -> Complexity {
    if routing.complexity == Complexity::Simple && PROMOTE_INTENTS.contains(&routing.intent) {
        Complexity::Medium
    } else {
        routing.complexity
    }
}

/// The model tier that backs a given complexity reading.
pub fn tier_for_complexity(complexity: Complexity) -> ModelTier {
    match complexity {
        Complexity::Simple => ModelTier::Haiku,
        Complexity::Medium => ModelTier::Sonnet,
        Complexity::Complex => ModelTier::Opus,
    }
}

/// Maps routing complexity (with the step-12 promotion) to a concrete model
/// id via `ExecutorConfig`'s simple/default/complex tiers.
pub fn resolve_model(config: &ExecutorConfig, routing: &RoutingDecision) -> String {
    match effective_complexity(routing) {
        Complexity::Simple => config.simple.clone(),
        Complexity::Medium => config.default.clone(),
        Complexity::Complex => config.complex.clone(),
    }
}

static GREETING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(hi|hello|hey|yo|good\s+(morning|afternoon|evening)|sup|howdy)\b").unwrap()
});
static BRIEFING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(brief|briefing|daily\s+summary|what'?s\s+new|catch\s+me\s+up|morning\s+report)\b").unwrap()
});
static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(code|function|bug|debug|stack\s*trace|compile|refactor|implement|exception|traceback)\b").unwrap()
});

/// Small-model classifier with fallback and heuristic safety net.
pub struct Orchestrator {
    primary: Arc<dyn LlmProvider>,
    fallback: Arc<dyn LlmProvider>,
    primary_model: String,
    fallback_model: String,
}

impl Orchestrator {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallback: Arc<dyn LlmProvider>,
        primary_model: String,
        fallback_model: String,
    ) -> Self {
        Self {
            primary,
            fallback,
            primary_model,
            fallback_model,
        }
    }

    /// `route(message, recentHistory[≤5], availableSkills) → RoutingDecision`
    /// (spec §4.1). Never fails: degrades through fallback, then heuristic.
    pub async fn route(
        &self,
        message: &str,
        recent_history: &[HistoryTurn],
        available_skills: &[SkillSummary],
    ) -> RoutingDecision {
        let prompt = build_prompt(message, recent_history, available_skills);

        match self.ask(&self.primary, &self.primary_model, &prompt).await {
            Ok(decision) => return decision,
            Err(e) => tracing::warn!(error = %e, "orchestrator primary failed, trying fallback"),
        }

        match self.ask(&self.fallback, &self.fallback_model, &prompt).await {
            Ok(decision) => return decision,
            Err(e) => tracing::warn!(error = %e, "orchestrator fallback failed, degrading to heuristic"),
        }

        heuristic_route(message)
    }

    async fn ask(
        &self,
        provider: &Arc<dyn LlmProvider>,
        model: &str,
        prompt: &str,
    ) -> Result<RoutingDecision, String> {
        let req = ChatRequest {
            model: model.to_string(),
            system: "You are a routing classifier. Respond with JSON only, no prose.".to_string(),
            messages: vec![Message {
                role: Role::User,
                content: prompt.to_string(),
            }],
            max_tokens: 512,
            temperature: Some(0.0),
            tools: vec![],
            raw_messages: None,
        };
        let resp = provider.send(&req).await.map_err(|e| e.to_string())?;
        let json_str = extract_json(&resp.content).ok_or_else(|| "no JSON object in response".to_string())?;
        let raw: RawDecision = serde_json::from_str(json_str).map_err(|e| e.to_string())?;
        Ok(RoutingDecision::from_raw(raw))
    }
}

/// Pulls the first top-level `{...}` object out of a model response, in
/// case it wraps the JSON in prose or a code fence.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn build_prompt(message: &str, recent_history: &[HistoryTurn], skills: &[SkillSummary]) -> String {
    let mut out = String::new();
    out.push_str("Available skills:\n");
    for skill in skills {
        out.push_str(&format!("- {}: {}\n", skill.name, skill.description));
    }
    out.push_str("\nRecent history:\n");
    for turn in recent_history.iter().take(5) {
        let content: String = turn.content.chars().take(150).collect();
        out.push_str(&format!("{}: {}\n", turn.role, content));
    }
    out.push_str(&format!(
        "\nCurrent message: {message}\n\n\
         Respond with a single JSON object with keys: selected_skill (string or null), \
         context_summary (string or null), intent (one of task_query, file_operation, \
         conversation, creative, code, analysis, greeting, briefing, workflow_trigger), \
         complexity (one of simple, medium, complex), suggested_model (one of haiku, sonnet, opus)."
    ));
    out
}

/// Deterministic fallback when both providers fail (spec §4.1 "Algorithm").
fn heuristic_route(message: &str) -> RoutingDecision {
    let raw = if GREETING_RE.is_match(message) {
        RawDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::Greeting,
            complexity: Complexity::Simple,
            suggested_model: ModelTier::Haiku,
        }
    } else if BRIEFING_RE.is_match(message) {
        RawDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::Briefing,
            complexity: Complexity::Medium,
            suggested_model: ModelTier::Sonnet,
        }
    } else if CODE_RE.is_match(message) {
        RawDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::Code,
            complexity: Complexity::Medium,
            suggested_model: ModelTier::Sonnet,
        }
    } else {
        RawDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::Conversation,
            complexity: Complexity::Simple,
            suggested_model: ModelTier::Sonnet,
        }
    };
    RoutingDecision::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_heuristic() {
        let d = heuristic_route("hi there");
        assert_eq!(d.intent, Intent::Greeting);
        assert_eq!(d.suggested_model, ModelTier::Haiku);
        assert_eq!(d.personality_level, PersonalityLevel::Full);
        assert!(!d.include_bio);
    }

    #[test]
    fn briefing_heuristic() {
        let d = heuristic_route("give me my morning report");
        assert_eq!(d.intent, Intent::Briefing);
        assert!(d.include_bio);
        assert_eq!(d.bio_sections, vec!["professional", "current_projects"]);
    }

    #[test]
    fn code_heuristic() {
        let d = heuristic_route("I have a bug in my function");
        assert_eq!(d.intent, Intent::Code);
        assert_eq!(d.personality_level, PersonalityLevel::Minimal);
    }

    #[test]
    fn default_heuristic() {
        let d = heuristic_route("tell me about the weather in Kyoto");
        assert_eq!(d.intent, Intent::Conversation);
        assert_eq!(d.complexity, Complexity::Simple);
        assert_eq!(d.suggested_model, ModelTier::Sonnet);
    }

    #[test]
    fn resolve_model_promotes_simple_for_named_intents() {
        let config = ExecutorConfig {
            simple: "haiku-id".into(),
            default: "sonnet-id".into(),
            complex: "opus-id".into(),
            max_tool_rounds: 5,
        };
        let decision = RoutingDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::Code,
            complexity: Complexity::Simple,
            suggested_model: ModelTier::Haiku,
            personality_level: PersonalityLevel::Minimal,
            include_bio: true,
            bio_sections: vec![],
        };
        assert_eq!(resolve_model(&config, &decision), "sonnet-id");
    }

    #[test]
    fn resolve_model_leaves_conversation_at_simple() {
        let config = ExecutorConfig {
            simple: "haiku-id".into(),
            default: "sonnet-id".into(),
            complex: "opus-id".into(),
            max_tool_rounds: 5,
        };
        let decision = RoutingDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::Conversation,
            complexity: Complexity::Simple,
            suggested_model: ModelTier::Sonnet,
            personality_level: PersonalityLevel::Full,
            include_bio: false,
            bio_sections: vec![],
        };
        assert_eq!(resolve_model(&config, &decision), "haiku-id");
    }

    #[test]
    fn json_extraction_strips_prose_wrapper() {
        let text = "Sure, here you go:\n```json\n{\"a\":1}\n```\nhope that helps";
        assert_eq!(extract_json(text), Some("{\"a\":1}"));
    }
}
