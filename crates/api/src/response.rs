//! Shared response envelope for API handlers.
//!
//! Successful responses are `{"ok": true, ...fields}`; failures are built by
//! [`AppError`](crate::error::AppError). Payload types must serialize as
//! JSON objects since their fields are flattened into the envelope.

use serde::Serialize;

/// Standard `{"ok": true, ...}` response envelope.
///
/// ```ignore
/// Ok(Json(OkResponse::new(ResultsBody { results })))
/// ```
#[derive(Debug, Serialize)]
pub struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> OkResponse<T> {
    pub fn new(body: T) -> Self {
        Self { ok: true, body }
    }
}
