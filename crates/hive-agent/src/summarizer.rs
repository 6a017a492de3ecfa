//! Summarizer (spec §4.4, C5): rolling compression of long conversation
//! histories so per-turn token cost stays bounded. Invoked fire-and-forget
//! by the Gateway after every response; failures are swallowed by the caller.

use hive_core::{HiveError, Result};
use hive_provider::{ChatRequest, LlmProvider, Message, Role};
use hive_store::Store;
use tracing::warn;

const CONDENSE_THRESHOLD: u32 = 20;
const KEEP_LAST: u32 = 6;
const SUMMARY_MAX_TOKENS: u32 = 256;
const SUMMARY_PROMPT: &str = "Summarize this conversation concisely in 2–4 sentences, \
    preserving names, decisions, and any open questions.";

pub struct Summarizer<'a> {
    provider: &'a dyn LlmProvider,
    model_id: String,
}

impl<'a> Summarizer<'a> {
    pub fn new(provider: &'a dyn LlmProvider, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    /// Condenses `conversation_id` if its message count has crossed the
    /// threshold. A no-op, not an error, when the conversation is still short.
    pub async fn maybe_summarize(&self, store: &Store, conversation_id: &str) -> Result<()> {
        let count = store.message_count(conversation_id)?;
        if count < CONDENSE_THRESHOLD {
            return Ok(());
        }

        let to_condense = store.messages_to_condense(conversation_id, KEEP_LAST)?;
        if to_condense.is_empty() {
            return Ok(());
        }

        let conversation = store
            .get_conversation(conversation_id)?
            .ok_or_else(|| HiveError::NotFound(format!("conversation {conversation_id}")))?;
        let prior_summary = conversation.summary.unwrap_or_default();

        let transcript = to_condense
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let user_content = format!("Previous context: {prior_summary}\n\nConversation:\n{transcript}");

        let request = ChatRequest {
            model: self.model_id.clone(),
            system: SUMMARY_PROMPT.to_string(),
            messages: vec![Message {
                role: Role::User,
                content: user_content,
            }],
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: Some(0.0),
            tools: vec![],
            raw_messages: None,
        };

        let response = self.provider.send(&request).await.map_err(HiveError::from)?;
        store.set_conversation_summary(conversation_id, response.content.trim())?;
        Ok(())
    }
}

/// Spawns `maybe_summarize` detached and swallows any failure, matching the
/// fire-and-forget contract in spec §4.4.
pub fn spawn_fire_and_forget(store: std::sync::Arc<Store>, provider: std::sync::Arc<dyn LlmProvider>, model_id: String, conversation_id: String) {
    tokio::spawn(async move {
        let summarizer = Summarizer::new(provider.as_ref(), model_id);
        if let Err(e) = summarizer.maybe_summarize(&store, &conversation_id).await {
            warn!(error = %e, conversation_id, "summarization failed, continuing without it");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_provider::{ChatResponse, ProviderError};
    use hive_store::types::MessageRole;

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "A concise summary.".to_string(),
                model: "haiku".to_string(),
                tokens_in: 50,
                tokens_out: 10,
                stop_reason: "end_turn".to_string(),
                tool_calls: vec![],
            })
        }
    }

    fn seed_conversation(store: &Store, count: u32) -> String {
        store.ensure_user("alice").unwrap();
        let conv = store.create_conversation("alice", None).unwrap();
        for i in 0..count {
            let role = if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant };
            store.append_message(&conv.id, role, &format!("message {i}")).unwrap();
        }
        conv.id
    }

    #[tokio::test]
    async fn skips_short_conversations() {
        let store = Store::open_in_memory().unwrap();
        let conv_id = seed_conversation(&store, 5);
        let provider = StubProvider;
        let summarizer = Summarizer::new(&provider, "haiku-model");
        summarizer.maybe_summarize(&store, &conv_id).await.unwrap();
        let conv = store.get_conversation(&conv_id).unwrap().unwrap();
        assert!(conv.summary.is_none());
    }

    #[tokio::test]
    async fn condenses_once_threshold_crossed() {
        let store = Store::open_in_memory().unwrap();
        let conv_id = seed_conversation(&store, 25);
        let provider = StubProvider;
        let summarizer = Summarizer::new(&provider, "haiku-model");
        summarizer.maybe_summarize(&store, &conv_id).await.unwrap();
        let conv = store.get_conversation(&conv_id).unwrap().unwrap();
        assert_eq!(conv.summary.as_deref(), Some("A concise summary."));
    }
}
