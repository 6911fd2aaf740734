//! Route definitions for result retrieval endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::results;
use crate::state::AppState;

/// Routes mounted at `/results`.
///
/// ```text
/// GET    /                          -> list_results
/// GET    /{id}                      -> get_result
/// POST   /{id}/export               -> export_result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(results::list_results))
        .route("/{id}", get(results::get_result))
        .route("/{id}/export", post(results::export_result))
}
