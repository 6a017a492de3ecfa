//! LLM provider abstraction shared by the Orchestrator (C2) and Executor (C4):
//! a uniform `ChatRequest`/`ChatResponse` contract, three concrete providers
//! (Anthropic, OpenAI, Ollama), and a priority-ordered router with failover.

mod anthropic;
mod ollama;
mod openai;
mod router;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use router::{ProviderRouter, ProviderSlot};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Request to an LLM provider (spec §4.3: Executor's `execute` contract).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub tools: Vec<ToolDefinition>,
    /// Raw JSON messages built by the tool-use loop; overrides `messages` when set.
    pub raw_messages: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl From<ProviderError> for hive_core::HiveError {
    /// Surfaced verbatim as `"provider error (status): msg"` (spec §4.3 Failure).
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Api { status, message } => {
                hive_core::HiveError::Transport(format!("provider error ({status}): {message}"))
            }
            ProviderError::RateLimited { retry_after_ms } => {
                hive_core::HiveError::Transport(format!("provider rate limited, retry after {retry_after_ms}ms"))
            }
            other => hive_core::HiveError::Transport(other.to_string()),
        }
    }
}

/// Common interface implemented by every LLM provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}
