//! Priority-ordered provider failover (spec §9: "fallback is expressed by
//! composition, not subclassing"). A `ProviderSlot` wraps one concrete
//! provider; the router tries each slot in order and returns the first
//! success, surfacing the last error if every slot fails.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

/// Routes a request across multiple LLM providers with automatic failover.
///
/// Providers are tried in priority order (index 0 first, typically the
/// configured hosted provider with a local or secondary provider behind
/// it). Used by the Orchestrator as its primary→fallback slot pair before
/// degrading further to the deterministic heuristic.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    /// At least one slot is required.
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        assert!(!slots.is_empty(), "ProviderRouter requires at least one provider slot");
        Self { slots }
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            let provider_name = slot.provider.name();
            match slot.provider.send(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!(provider = %provider_name, err = %e, "provider send failed, trying next");
                    last_err = Some(e);
                }
            }
        }

        info!("all provider slots exhausted");
        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("no providers configured".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, Role};

    struct AlwaysFail;

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("intentional failure".to_string()))
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".to_string(),
                tool_calls: Vec::new(),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            system: "You are a test.".to_string(),
            messages: vec![Message { role: Role::User, content: "hello".to_string() }],
            max_tokens: 64,
            temperature: None,
            tools: Vec::new(),
            raw_messages: None,
        }
    }

    #[tokio::test]
    async fn router_falls_back_to_second_provider() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail)),
            ProviderSlot::new(Box::new(AlwaysOk)),
        ]);

        let result = router.send(&dummy_request()).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn router_errors_when_all_fail() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail)),
            ProviderSlot::new(Box::new(AlwaysFail)),
        ]);

        let result = router.send(&dummy_request()).await;
        assert!(result.is_err());
    }
}
