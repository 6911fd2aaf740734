//! Handlers for starting runs.

use auditflow_core::types::RunId;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::orchestrator::RunRequest;
use crate::response::OkResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/runs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunRequest {
    pub script_key: String,
    #[serde(flatten)]
    pub run: RunRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunBody {
    pub run_id: RunId,
}

/// POST /api/v1/runs
///
/// Returns 202 with the run id; progress follows on `/ws/progress`.
pub async fn start_run(
    State(state): State<AppState>,
    Json(input): Json<StartRunRequest>,
) -> AppResult<(StatusCode, Json<OkResponse<StartRunBody>>)> {
    if input.script_key.trim().is_empty() {
        return Err(AppError::BadRequest("scriptKey is required".to_string()));
    }

    let run_id = state.orchestrator.run(&input.script_key, input.run).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(OkResponse::new(StartRunBody { run_id })),
    ))
}
