//! Fleet control endpoints under /bots.
//!
//! `start`, `stop` and `restart` run the supervisor call inline and answer
//! with the outcome. `reload` only enqueues a background restart and answers
//! 202 straight away; it is meant to be hit right after an external tool has
//! edited a bot's token or integrations.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use dai_core::types::{BotId, BotRecord};
use dai_fleet::{BotIdentity, BotStatus, FleetError};

use crate::app::AppState;

type ApiError = (StatusCode, Json<Value>);

/// Catalog row joined with the live supervisor snapshot.
#[derive(Debug, Serialize)]
pub struct BotView {
    #[serde(flatten)]
    pub record: BotRecord,
    pub running: bool,
    pub live: Option<BotStatus>,
}

impl BotView {
    fn new(record: BotRecord, state: &AppState) -> Self {
        Self {
            running: state.supervisor.status(record.id),
            live: state.supervisor.get(record.id),
            record,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BotQuery {
    /// Exact bot name; omitted lists every bot.
    pub name: Option<String>,
}

/// GET /bots?name=N
pub async fn list_bots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BotQuery>,
) -> Result<Json<Vec<BotView>>, ApiError> {
    let records = match query.name {
        Some(name) => state
            .catalog
            .bot_by_name(&name)
            .map_err(internal)?
            .into_iter()
            .collect(),
        None => state.catalog.bots().map_err(internal)?,
    };
    let views = records
        .into_iter()
        .map(|record| BotView::new(record, &state))
        .collect();
    Ok(Json(views))
}

/// GET /bots/{id}
pub async fn get_bot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<BotView>, ApiError> {
    let record = load_record(&state, BotId(id))?;
    Ok(Json(BotView::new(record, &state)))
}

/// POST /bots/{id}/start
pub async fn start_bot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let id = BotId(id);
    let _guard = state.supervisor.lock(id).await;
    let record = load_record(&state, id)?;
    info!(bot = %id, name = %record.name, "start requested");

    match state.supervisor.start(BotIdentity::from(&record)).await {
        Ok(()) => {
            mark_active(&state, id, true);
            Ok(Json(json!({ "id": id, "running": true })))
        }
        Err(e) => {
            if !matches!(e, FleetError::Duplicate { .. }) {
                mark_active(&state, id, false);
            }
            Err(fleet_error(e))
        }
    }
}

/// POST /bots/{id}/stop: absent bots are a no-op, not an error.
pub async fn stop_bot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let id = BotId(id);
    info!(bot = %id, "stop requested");
    let _guard = state.supervisor.lock(id).await;
    state.supervisor.stop(id).await.map_err(fleet_error)?;
    mark_active(&state, id, false);
    Ok(Json(json!({ "id": id, "running": false })))
}

/// POST /bots/{id}/restart
pub async fn restart_bot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let id = BotId(id);
    let _guard = state.supervisor.lock(id).await;
    let record = load_record(&state, id)?;
    info!(bot = %id, name = %record.name, "restart requested");

    let result = state.supervisor.restart(BotIdentity::from(&record)).await;
    mark_active(&state, id, FleetError::leaves_running(&result));
    result.map_err(fleet_error)?;
    Ok(Json(json!({ "id": id, "running": true })))
}

/// POST /bots/{id}/reload
pub async fn reload_bot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let id = BotId(id);
    state.restarts.enqueue(id).map_err(fleet_error)?;
    info!(bot = %id, "background restart queued");
    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id, "queued": true }))))
}

fn load_record(state: &AppState, id: BotId) -> Result<BotRecord, ApiError> {
    state
        .catalog
        .bot(id)
        .map_err(internal)?
        .ok_or_else(|| fleet_error(FleetError::Unknown { id }))
}

fn mark_active(state: &AppState, id: BotId, active: bool) {
    if let Err(e) = state.catalog.set_bot_active(id, active) {
        warn!(bot = %id, error = %e, "failed to record bot activity");
    }
}

fn fleet_error(e: FleetError) -> ApiError {
    let status = match e {
        FleetError::Duplicate { .. } => StatusCode::CONFLICT,
        FleetError::Unknown { .. } => StatusCode::NOT_FOUND,
        FleetError::Connection { .. } => StatusCode::BAD_GATEWAY,
        FleetError::Setup { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FleetError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    warn!(error = %e, "catalog query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}
