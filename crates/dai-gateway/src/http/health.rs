use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check with fleet and memory counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "command_prefix": state.config.discord.command_prefix,
        "bots_running": state.supervisor.len(),
        "bots": state.supervisor.statuses(),
        "memory_keys": state.memory.key_count(),
        "memory_capacity": state.memory.capacity(),
        "logged_exchanges": state.log.len(),
        "started_at": state.started_at,
    }))
}
