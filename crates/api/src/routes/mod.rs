pub mod health;
pub mod results;
pub mod runs;
pub mod scripts;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /scripts                          registered scripts (GET)
/// /inputs/accepted                  accepted input extensions (GET)
/// /interpreter                      worker interpreter probe (GET)
///
/// /runs                             start a run (POST)
///
/// /results                          list results (GET)
/// /results/{id}                     locate one result (GET)
/// /results/{id}/export              copy a result to a destination (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(scripts::router())
        .nest("/runs", runs::router())
        .nest("/results", results::router())
}

/// Root-level WebSocket routes.
///
/// ```text
/// /ws/progress?runId=               progress event stream
/// ```
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws/progress", get(ws::progress_handler))
}
