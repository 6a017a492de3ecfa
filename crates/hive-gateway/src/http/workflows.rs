//! POST /v1/workflows/:id/run (spec §2.1): runs a workflow on demand,
//! outside the trigger phrase / scheduler paths.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct RunWorkflowRequest {
    pub caller_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct RunWorkflowReply {
    pub status: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct RunWorkflowError {
    pub error: String,
}

pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RunWorkflowRequest>,
) -> Result<Json<RunWorkflowReply>, (StatusCode, Json<RunWorkflowError>)> {
    match state.engine.execute_workflow(&id, &req.caller_user_id).await {
        Ok(result) => Ok(Json(RunWorkflowReply { status: format!("{:?}", result.status), duration_ms: result.total_duration_ms })),
        Err(e) => {
            warn!(workflow_id = %id, error = %e, "POST /v1/workflows/:id/run failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(RunWorkflowError { error: e.to_string() })))
        }
    }
}
