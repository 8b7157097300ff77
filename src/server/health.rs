//! Health check endpoint for liveness probes.

use axum::Json;
use serde_json::{Value, json};

/// Returns `200 {"status":"ok"}` whenever the server is accepting requests.
pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
