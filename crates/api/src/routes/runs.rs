//! Route definitions for run endpoints.

use axum::routing::post;
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/runs`.
///
/// ```text
/// POST   /                          -> start_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(runs::start_run))
}
