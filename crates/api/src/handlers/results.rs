//! Handlers for listing, locating and exporting results.

use std::path::PathBuf;

use auditflow_store::ResultArtifact;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::OkResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ResultsBody {
    pub results: Vec<ResultArtifact>,
}

#[derive(Debug, Serialize)]
pub struct ResultBody {
    pub result: ResultArtifact,
}

/// Request body for the export endpoint.
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    /// Target file, or an existing directory to copy into.
    pub destination: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBody {
    pub file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/results
pub async fn list_results(
    State(state): State<AppState>,
) -> AppResult<Json<OkResponse<ResultsBody>>> {
    let results = state.orchestrator.list_results().await?;
    Ok(Json(OkResponse::new(ResultsBody { results })))
}

/// GET /api/v1/results/{id}
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<OkResponse<ResultBody>>> {
    let result = state.orchestrator.get_result(&id).await?;
    Ok(Json(OkResponse::new(ResultBody { result })))
}

/// POST /api/v1/results/{id}/export
pub async fn export_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ExportRequest>,
) -> AppResult<Json<OkResponse<ExportBody>>> {
    if input.destination.as_os_str().is_empty() {
        return Err(AppError::BadRequest("destination is required".to_string()));
    }

    let file_path = state
        .orchestrator
        .download_result(&id, &input.destination)
        .await?;
    Ok(Json(OkResponse::new(ExportBody { file_path })))
}
