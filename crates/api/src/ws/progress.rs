use auditflow_core::types::RunId;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use auditflow_events::ProgressReceiver;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::state::AppState;

/// Query string of `/ws/progress`. Without `runId` every run is streamed.
///
/// A stream only carries events published after the upgrade. A run id is
/// known once `POST /api/v1/runs` returns, and a fast worker may already
/// have finished by then, so clients should connect without `runId` before
/// starting a run and filter on the `runId` field of each frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub run_id: Option<RunId>,
}

/// HTTP handler that upgrades the connection to a progress stream.
///
/// The subscription is taken before the `101` response goes out, so every
/// event published after the handshake completes reaches the client.
pub async fn progress_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ProgressQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let events = state.orchestrator.progress_channel(query.run_id);
    ws.on_upgrade(move |socket| handle_socket(socket, events, query.run_id))
}

/// Forward progress events as JSON text frames until the client leaves.
async fn handle_socket(socket: WebSocket, mut events: ProgressReceiver, run_id: Option<RunId>) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(conn_id = %conn_id, run_id = ?run_id, "Progress stream connected");

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward bus events to the WebSocket sink.
    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Cannot serialize progress event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: only watches for the client going away.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Aborting the sender drops the subscription.
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Progress stream disconnected");
}
