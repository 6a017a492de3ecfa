//! Composition root (spec §9 "Construction order"): one shared state
//! struct built bottom-up, handed to Axum as `Arc<AppState>`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use hive_agent::Orchestrator;
use hive_core::config::HiveConfig;
use hive_core::Result;
use hive_provider::{AnthropicProvider, LlmProvider, OllamaProvider, OpenAiProvider, ProviderRouter, ProviderSlot};
use hive_sandbox::ScriptRunner;
use hive_scheduler::SchedulerEngine;
use hive_store::Store;
use hive_vault::Vault;
use hive_workflow::{WorkflowEngine, WorkflowTrigger};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::gateway::Gateway;
use crate::notify::LoggingNotificationSender;
use crate::reminder_sweep::ReminderSweeper;

/// Shared state handed to every Axum handler.
pub struct AppState {
    pub config: HiveConfig,
    pub store: Arc<Store>,
    pub gateway: Arc<Gateway>,
    pub engine: Arc<WorkflowEngine>,
    pub scheduler: Arc<SchedulerEngine>,
    pub reminder_sweeper: Arc<ReminderSweeper>,
}

impl AppState {
    /// Builds every subsystem in dependency order and resolves the
    /// Gateway⇄WorkflowTrigger construction cycle (spec §9): the Gateway is
    /// built first without a trigger, the WorkflowEngine is built on top of
    /// it as a `GatewayCaller`, the scheduler is built on top of the engine
    /// as a `WorkflowRunner`, the trigger is built on top of the engine, and
    /// finally the trigger is bound back into the Gateway.
    pub async fn bootstrap(config: HiveConfig) -> Result<Arc<Self>> {
        let store = Arc::new(Store::open(&config.database.path)?);
        let vault = Arc::new(Vault::open(&config.data_dir, store.clone())?);
        let sandbox = Arc::new(ScriptRunner::new(&config.sandbox));

        let executor_provider = build_provider_router(&config)?;
        let orchestrator = Orchestrator::new(
            executor_provider.clone(),
            executor_provider.clone(),
            config.orchestrator.primary_model.clone(),
            config.orchestrator.fallback_model.clone(),
        );

        let gateway = Gateway::new(
            store.clone(),
            vault.clone(),
            config.data_dir.clone(),
            config.clone(),
            orchestrator,
            executor_provider,
            sandbox.clone(),
        );

        let notifier = Arc::new(LoggingNotificationSender);
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            vault.clone(),
            sandbox.clone(),
            gateway.clone(),
            notifier.clone(),
            config.data_dir.clone(),
        ));

        let scheduler = SchedulerEngine::new(store.clone(), engine.clone());
        scheduler.start().await?;

        let trigger = Arc::new(WorkflowTrigger::new(store.clone(), engine.clone(), config.trigger.clone()));
        gateway.set_trigger(trigger);

        let reminder_sweeper = Arc::new(ReminderSweeper::new(store.clone(), notifier, config.notifications.chunk_size));

        info!(data_dir = %config.data_dir, "Hive bootstrapped");

        Ok(Arc::new(Self { config, store, gateway, engine, scheduler, reminder_sweeper }))
    }
}

fn build_provider_router(config: &HiveConfig) -> Result<Arc<dyn LlmProvider>> {
    let mut slots = Vec::new();

    if let Some(anthropic) = &config.providers.anthropic {
        slots.push(ProviderSlot::new(Box::new(AnthropicProvider::new(
            anthropic.api_key.clone(),
            anthropic.base_url.clone(),
        ))));
    }
    if let Some(openai) = &config.providers.openai {
        slots.push(ProviderSlot::new(Box::new(OpenAiProvider::new(openai.api_key.clone(), openai.base_url.clone()))));
    }
    if let Some(ollama) = &config.providers.ollama {
        slots.push(ProviderSlot::new(Box::new(OllamaProvider::new(ollama.base_url.clone()))));
    }

    if slots.is_empty() {
        return Err(hive_core::HiveError::NotConfigured("no LLM provider configured".to_string()));
    }

    Ok(Arc::new(ProviderRouter::new(slots)))
}

/// Assembles the full Axum router (spec §2.1).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(crate::http::health::health_handler))
        .route("/v1/messages", post(crate::http::messages::send_message))
        .route("/v1/workflows/{id}/run", post(crate::http::workflows::run_workflow))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
