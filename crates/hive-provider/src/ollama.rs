//! Local-LLM provider over Ollama's `/api/chat` endpoint (spec §9: the
//! "local-LLM" implementation behind the pluggable orchestrator capability).
//! No API key; intended for self-hosted fallback when the hosted provider
//! is unreachable.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut messages = vec![serde_json::json!({ "role": "system", "content": req.system })];
        for m in &req.messages {
            messages.push(serde_json::json!({ "role": m.role, "content": m.content }));
        }

        let body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "stream": false,
        });

        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %req.model, "sending request to Ollama");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(ChatResponse {
            content: api_resp.message.content,
            model: api_resp.model,
            tokens_in: api_resp.prompt_eval_count.unwrap_or(0),
            tokens_out: api_resp.eval_count.unwrap_or(0),
            stop_reason: "stop".to_string(),
            tool_calls: Vec::new(),
        })
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    message: ApiMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: String,
}
