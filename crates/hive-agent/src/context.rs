//! Context Builder (spec §4.2, C3): assembles the system prompt and message
//! window from routing + skill + per-user overrides.

use hive_provider::{Message, Role};

use crate::orchestrator::{PersonalityLevel, RoutingDecision};

/// Per-user override bag (spec §4.2 Inputs): soul prompt, basic identity,
/// profile prompt, and a rendered file-listing block for `file_operation`
/// turns. All optional; empty parts are omitted from the assembled prompt.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub soul_prompt: Option<String>,
    pub basic_identity: Option<String>,
    pub profile_prompt: Option<String>,
    pub file_context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

pub struct BuildInput<'a> {
    pub routing: &'a RoutingDecision,
    pub user_message: &'a str,
    /// Up to five prior turns, excluding the current message.
    pub prior_turns: &'a [HistoryTurn],
    pub skill_content: Option<&'a str>,
    pub overrides: &'a Overrides,
    /// Active tool names for this turn; non-empty enables the tool-usage
    /// policy block.
    pub active_tool_names: &'a [String],
    pub conversation_summary: Option<&'a str>,
    pub timezone: &'a str,
    pub assistant_name: &'a str,
}

pub struct BuiltContext {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub estimated_tokens: u32,
}

pub struct ContextBuilder;

impl ContextBuilder {
    /// System-prompt assembly order (spec §4.2): personality → basic
    /// identity → current time → tool-usage policy → full profile (if
    /// `includeBio`) → file listing → skill block → conversation summary.
    /// Empty parts are omitted.
    pub fn build(input: &BuildInput<'_>) -> BuiltContext {
        let mut parts: Vec<String> = Vec::new();

        if let Some(personality) = Self::personality_block(input) {
            parts.push(personality);
        }

        parts.push(Self::basic_identity_block(input));
        parts.push(Self::current_time_block(input.timezone));

        if !input.active_tool_names.is_empty() {
            parts.push(Self::tool_policy_block());
        }

        if input.routing.include_bio {
            if let Some(profile) = &input.overrides.profile_prompt {
                parts.push(profile.clone());
            }
        }

        if let Some(file_context) = &input.overrides.file_context {
            parts.push(file_context.clone());
        }

        if let Some(skill) = input.skill_content {
            parts.push(skill.to_string());
        }

        let summary = input.routing.context_summary.clone().or_else(|| input.conversation_summary.map(String::from));
        if let Some(summary) = summary {
            parts.push(format!("Conversation summary: {summary}"));
        }

        let system_prompt = parts.into_iter().filter(|p| !p.trim().is_empty()).collect::<Vec<_>>().join("\n\n");

        let mut messages: Vec<Message> = input
            .prior_turns
            .iter()
            .take(5)
            .map(|t| Message {
                role: t.role,
                content: t.content.clone(),
            })
            .collect();
        messages.push(Message {
            role: Role::User,
            content: input.user_message.to_string(),
        });

        let message_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let estimated_tokens = ((system_prompt.len() + message_chars) as f64 / 4.0).ceil() as u32;

        BuiltContext {
            system_prompt,
            messages,
            estimated_tokens,
        }
    }

    fn personality_block(input: &BuildInput<'_>) -> Option<String> {
        match input.routing.personality_level {
            PersonalityLevel::None => None,
            PersonalityLevel::Full => input.overrides.soul_prompt.clone(),
            PersonalityLevel::Minimal => input
                .overrides
                .soul_prompt
                .as_ref()
                .map(|s| s.chars().take(400).collect()),
        }
    }

    /// ~20 tokens always present: name + timezone (spec §4.2).
    fn basic_identity_block(input: &BuildInput<'_>) -> String {
        match &input.overrides.basic_identity {
            Some(identity) => identity.clone(),
            None => format!("You are {}. Timezone: {}.", input.assistant_name, input.timezone),
        }
    }

    fn current_time_block(timezone: &str) -> String {
        format!(
            "Current date/time: {} ({timezone})",
            chrono::Utc::now().to_rfc3339()
        )
    }

    /// Forbids the model from fabricating tool-call side effects (spec §4.2).
    fn tool_policy_block() -> String {
        "Tool usage policy: only claim to have performed an action (sent a message, fetched a \
         URL, scheduled a reminder, run a script) if you actually invoked the corresponding tool \
         and observed its result. Never describe a side effect as done unless the tool result \
         confirms it."
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{Complexity, Intent};
    use hive_core::ModelTier;

    fn routing(personality: PersonalityLevel, include_bio: bool) -> RoutingDecision {
        RoutingDecision {
            selected_skill: None,
            context_summary: None,
            intent: Intent::Conversation,
            complexity: Complexity::Simple,
            suggested_model: ModelTier::Haiku,
            personality_level: personality,
            include_bio,
            bio_sections: vec![],
        }
    }

    #[test]
    fn omits_empty_parts() {
        let routing = routing(PersonalityLevel::None, false);
        let overrides = Overrides::default();
        let input = BuildInput {
            routing: &routing,
            user_message: "hi",
            prior_turns: &[],
            skill_content: None,
            overrides: &overrides,
            active_tool_names: &[],
            conversation_summary: None,
            timezone: "UTC",
            assistant_name: "Hive",
        };
        let built = ContextBuilder::build(&input);
        assert!(!built.system_prompt.contains("Tool usage policy"));
        assert!(built.system_prompt.contains("Hive"));
    }

    #[test]
    fn includes_tool_policy_when_tools_active() {
        let routing = routing(PersonalityLevel::Minimal, false);
        let overrides = Overrides::default();
        let tools = vec!["manage_reminders".to_string()];
        let input = BuildInput {
            routing: &routing,
            user_message: "remind me",
            prior_turns: &[],
            skill_content: None,
            overrides: &overrides,
            active_tool_names: &tools,
            conversation_summary: None,
            timezone: "UTC",
            assistant_name: "Hive",
        };
        let built = ContextBuilder::build(&input);
        assert!(built.system_prompt.contains("Tool usage policy"));
    }

    #[test]
    fn estimated_tokens_uses_four_char_heuristic() {
        let routing = routing(PersonalityLevel::None, false);
        let overrides = Overrides::default();
        let input = BuildInput {
            routing: &routing,
            user_message: "12345678",
            prior_turns: &[],
            skill_content: None,
            overrides: &overrides,
            active_tool_names: &[],
            conversation_summary: None,
            timezone: "UTC",
            assistant_name: "H",
        };
        let built = ContextBuilder::build(&input);
        let expected = ((built.system_prompt.len() + 8) as f64 / 4.0).ceil() as u32;
        assert_eq!(built.estimated_tokens, expected);
    }
}
