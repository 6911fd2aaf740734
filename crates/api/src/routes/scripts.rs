//! Route definitions for script catalog endpoints.

use axum::routing::get;
use axum::Router;

use crate::handlers::scripts;
use crate::state::AppState;

/// Catalog routes mounted at the `/api/v1` root.
///
/// ```text
/// GET    /scripts                   -> list_scripts
/// GET    /inputs/accepted           -> accepted_inputs
/// GET    /interpreter               -> probe_interpreter
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scripts", get(scripts::list_scripts))
        .route("/inputs/accepted", get(scripts::accepted_inputs))
        .route("/interpreter", get(scripts::probe_interpreter))
}
