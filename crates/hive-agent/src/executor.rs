//! Executor (spec §4.3, C4): calls the LLM provider, runs the tool-use loop,
//! and reports tokens and cost. The loop is bounded by `maxToolRounds`
//! (default 5) and tracks running cost on every round.

use hive_core::{HiveError, ModelTier, Result};
use hive_provider::{ChatRequest, ChatResponse, LlmProvider, Message, ToolCall, ToolDefinition};
use tracing::{debug, warn};

use crate::tools::Tool;

const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub tools: Vec<ToolDefinition>,
    pub max_tool_rounds: u32,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_tokens: 1024,
            temperature: None,
            tools: Vec::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub content: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_cents: f64,
    pub model_id: String,
}

pub struct Executor<'a> {
    provider: &'a dyn LlmProvider,
}

impl<'a> Executor<'a> {
    pub fn new(provider: &'a dyn LlmProvider) -> Self {
        Self { provider }
    }

    /// `execute(messages, model, options)` (spec §4.3).
    pub async fn execute(
        &self,
        messages: Vec<Message>,
        model_id: &str,
        tier: ModelTier,
        options: ExecuteOptions,
        tool_impls: &[Box<dyn Tool>],
    ) -> Result<ExecuteOutcome> {
        let initial_request = ChatRequest {
            model: model_id.to_string(),
            system: options.system_prompt.clone(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            tools: options.tools.clone(),
            raw_messages: None,
        };

        let mut raw_messages: Vec<serde_json::Value> = initial_request
            .messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
            .collect();

        let max_rounds = options.max_tool_rounds.max(1);
        let mut tokens_in_total: u32 = 0;
        let mut tokens_out_total: u32 = 0;
        let mut last_response: Option<ChatResponse> = None;

        for round in 0..max_rounds {
            let mut req = initial_request.clone();
            req.raw_messages = Some(raw_messages.clone());

            debug!(round, "executor tool loop round");

            let response = self.provider.send(&req).await?;
            tokens_in_total += response.tokens_in;
            tokens_out_total += response.tokens_out;

            if response.tool_calls.is_empty() || response.stop_reason != "tool_use" {
                last_response = Some(response);
                break;
            }

            let mut assistant_content: Vec<serde_json::Value> = Vec::new();
            if !response.content.is_empty() {
                assistant_content.push(serde_json::json!({ "type": "text", "text": response.content }));
            }
            for call in &response.tool_calls {
                assistant_content.push(serde_json::json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.input,
                }));
            }
            raw_messages.push(serde_json::json!({ "role": "assistant", "content": assistant_content }));

            let mut tool_result_content: Vec<serde_json::Value> = Vec::new();
            for call in &response.tool_calls {
                let result = execute_tool(tool_impls, call).await;
                tool_result_content.push(serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": call.id,
                    "content": result.content,
                    "is_error": result.is_error,
                }));
            }
            raw_messages.push(serde_json::json!({ "role": "user", "content": tool_result_content }));

            last_response = Some(response);

            if round + 1 == max_rounds {
                warn!(max_rounds, "executor hit maxToolRounds without a final response");
            }
        }

        let response = last_response
            .ok_or_else(|| HiveError::Internal("executor produced no response".to_string()))?;

        let (price_in, price_out) = tier.pricing_per_million();
        let cost_cents = (tokens_in_total as f64 * price_in + tokens_out_total as f64 * price_out) / 1_000_000.0 * 100.0;

        Ok(ExecuteOutcome {
            content: response.content,
            tokens_in: tokens_in_total,
            tokens_out: tokens_out_total,
            cost_cents,
            model_id: model_id.to_string(),
        })
    }
}

/// An unknown tool name or a handler panic yields `{error: message}` so the
/// model can recover (spec §4.3).
async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall) -> crate::tools::ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            let input = call.input.clone();
            debug!(tool = %call.name, "executing tool");
            tool.execute(input).await
        }
        None => crate::tools::ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_provider::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        responses: Vec<ChatResponse>,
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(idx)
                .cloned()
                .ok_or_else(|| ProviderError::Parse("no more stub responses".to_string()))
        }
    }

    fn simple_response(content: &str, tokens_in: u32, tokens_out: u32) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            model: "stub-model".to_string(),
            tokens_in,
            tokens_out,
            stop_reason: "end_turn".to_string(),
            tool_calls: vec![],
        }
    }

    #[tokio::test]
    async fn single_round_with_no_tool_calls_computes_cost() {
        let provider = StubProvider {
            responses: vec![simple_response("hello", 100, 50)],
            call_count: AtomicUsize::new(0),
        };
        let executor = Executor::new(&provider);
        let outcome = executor
            .execute(
                vec![Message { role: hive_provider::Role::User, content: "hi".to_string() }],
                "claude-haiku",
                ModelTier::Haiku,
                ExecuteOptions::default(),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(outcome.content, "hello");
        assert_eq!(outcome.tokens_in, 100);
        assert_eq!(outcome.tokens_out, 50);
        let expected = (100.0 * 0.25 + 50.0 * 1.25) / 1_000_000.0 * 100.0;
        assert!((outcome.cost_cents - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_tool_call_yields_error_result_and_continues() {
        let tool_use = ChatResponse {
            content: String::new(),
            model: "stub-model".to_string(),
            tokens_in: 10,
            tokens_out: 10,
            stop_reason: "tool_use".to_string(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "does_not_exist".to_string(),
                input: serde_json::json!({}),
            }],
        };
        let provider = StubProvider {
            responses: vec![tool_use, simple_response("done", 5, 5)],
            call_count: AtomicUsize::new(0),
        };
        let executor = Executor::new(&provider);
        let outcome = executor
            .execute(
                vec![Message { role: hive_provider::Role::User, content: "hi".to_string() }],
                "claude-sonnet",
                ModelTier::Sonnet,
                ExecuteOptions::default(),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(outcome.content, "done");
        assert_eq!(outcome.tokens_in, 15);
        assert_eq!(outcome.tokens_out, 15);
    }

    #[tokio::test]
    async fn stops_after_max_tool_rounds() {
        let tool_use = ChatResponse {
            content: String::new(),
            model: "stub-model".to_string(),
            tokens_in: 1,
            tokens_out: 1,
            stop_reason: "tool_use".to_string(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "noop".to_string(),
                input: serde_json::json!({}),
            }],
        };
        let responses: Vec<ChatResponse> = (0..5).map(|_| tool_use.clone()).collect();
        let provider = StubProvider {
            responses,
            call_count: AtomicUsize::new(0),
        };
        let executor = Executor::new(&provider);
        let mut options = ExecuteOptions::default();
        options.max_tool_rounds = 2;
        let outcome = executor
            .execute(
                vec![Message { role: hive_provider::Role::User, content: "hi".to_string() }],
                "claude-sonnet",
                ModelTier::Sonnet,
                options,
                &[],
            )
            .await
            .unwrap();

        assert_eq!(outcome.tokens_in, 2);
        assert_eq!(outcome.tokens_out, 2);
    }
}
