use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::logging;

const STATUS_LOG_LINES: usize = 20;

/// Body of `POST /controller`.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub state: String,
    pub listeners: usize,
    pub bit_rate: Option<u64>,
    pub bytes_per_second: Option<u64>,
    pub recent_logs: Vec<String>,
}

pub async fn redirect_home() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/home")])
}

/// Run an operator command. Engine calls block on the mixer and the
/// playback lock, so they leave the async workers.
pub async fn handle_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Value>, ApiError> {
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || engine.handle_command(&request.command)).await??;
    Ok(Json(json!({ "result": "ok" })))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<StatusReport>, ApiError> {
    let engine = state.engine.clone();
    let (engine_state, bit_rate, bytes_per_second) = tokio::task::spawn_blocking(move || {
        (engine.state(), engine.bit_rate(), engine.bytes_per_second())
    })
    .await?;

    let mut recent_logs = logging::snapshot(&state.logs);
    let skip = recent_logs.len().saturating_sub(STATUS_LOG_LINES);
    recent_logs.drain(..skip);

    Ok(Json(StatusReport {
        state: format!("{:?}", engine_state).to_lowercase(),
        listeners: state.engine.registry().len(),
        bit_rate,
        bytes_per_second,
        recent_logs,
    }))
}
