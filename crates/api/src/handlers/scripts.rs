//! Handlers for the script catalog and worker environment.

use std::path::PathBuf;

use auditflow_core::registry::ScriptDefinition;
use auditflow_core::roles::InputRole;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::OkResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Public view of a [`ScriptDefinition`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub key: String,
    pub label: String,
    pub entry_point: PathBuf,
    pub declared_outputs: Vec<String>,
    pub positional_roles: Vec<InputRole>,
}

impl From<&ScriptDefinition> for ScriptSummary {
    fn from(def: &ScriptDefinition) -> Self {
        Self {
            key: def.key.clone(),
            label: def.label.clone(),
            entry_point: def.entry_point.clone(),
            declared_outputs: def.declared_outputs.clone(),
            positional_roles: def.positional_roles.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScriptsBody {
    pub scripts: Vec<ScriptSummary>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedInputsBody {
    pub extensions: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct InterpreterBody {
    pub interpreter: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/scripts
pub async fn list_scripts(State(state): State<AppState>) -> Json<OkResponse<ScriptsBody>> {
    let scripts = state
        .orchestrator
        .registry()
        .list()
        .map(ScriptSummary::from)
        .collect();
    Json(OkResponse::new(ScriptsBody { scripts }))
}

/// GET /api/v1/inputs/accepted
pub async fn accepted_inputs(
    State(state): State<AppState>,
) -> Json<OkResponse<AcceptedInputsBody>> {
    Json(OkResponse::new(AcceptedInputsBody {
        extensions: state.orchestrator.accepted_inputs(),
    }))
}

/// GET /api/v1/interpreter
///
/// Resolves the worker interpreter, failing with 503 when none is usable.
pub async fn probe_interpreter(
    State(state): State<AppState>,
) -> AppResult<Json<OkResponse<InterpreterBody>>> {
    let interpreter = state.orchestrator.interpreter().await?;
    Ok(Json(OkResponse::new(InterpreterBody { interpreter })))
}
