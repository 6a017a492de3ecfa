//! POST /v1/messages (spec §2.1, §4.6): the HTTP front door onto
//! `Gateway::process`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use hive_core::Channel;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::AppState;
use crate::gateway::{GatewayOptions, MessageInput};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub raw_user_id: String,
    pub message: String,
    #[serde(default = "default_channel")]
    pub channel: Channel,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub options: Option<RequestOptions>,
}

fn default_channel() -> Channel {
    Channel::Cli
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub force_skill: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl From<RequestOptions> for GatewayOptions {
    fn from(value: RequestOptions) -> Self {
        Self { force_skill: value.force_skill, tools: value.tools }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageReply {
    pub content: String,
    pub model: String,
    pub intent: String,
    #[serde(rename = "tokensIn")]
    pub tokens_in: u32,
    #[serde(rename = "tokensOut")]
    pub tokens_out: u32,
    #[serde(rename = "costCents")]
    pub cost_cents: f64,
    #[serde(rename = "estimatedTokensSaved")]
    pub estimated_tokens_saved: u32,
}

#[derive(Debug, Serialize)]
pub struct SendMessageError {
    pub error: String,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageReply>, (StatusCode, Json<SendMessageError>)> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(SendMessageError { error: "message cannot be empty".to_string() })));
    }

    let input = MessageInput {
        raw_user_id: req.raw_user_id,
        message: req.message,
        channel: req.channel,
        conversation_id: req.conversation_id,
        options: req.options.map(GatewayOptions::from).unwrap_or_default(),
    };

    match state.gateway.process(input).await {
        Ok(response) => Ok(Json(SendMessageReply {
            content: response.content,
            model: response.model,
            intent: format!("{:?}", response.routing.intent),
            tokens_in: response.tokens_in,
            tokens_out: response.tokens_out,
            cost_cents: response.cost_cents,
            estimated_tokens_saved: response.estimated_tokens_saved,
        })),
        Err(e) => {
            warn!(error = %e, "POST /v1/messages failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(SendMessageError { error: e.to_string() })))
        }
    }
}
