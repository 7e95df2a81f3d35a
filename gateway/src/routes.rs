//! Turnaround API Routes
//!
//! - GET status (phase, doors, equipment, counters)
//! - GET events (most recent turnaround events)
//! - GET events/stream (server-sent events as they happen)
//! - GET config (effective configuration)
//! - POST reset (back to preflight)

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::warn;

use turnaround_core::{TurnaroundConfig, TurnaroundStatus};

use crate::runner::{Command, EventEnvelope, RunnerHandle};

const DEFAULT_EVENT_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub runner: RunnerHandle,
    pub config: Arc<TurnaroundConfig>,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventEnvelope>,
    pub count: usize,
}

pub fn turnaround_routes(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/events", get(list_events))
        .route("/events/stream", get(stream_events))
        .route("/config", get(get_config))
        .route("/reset", post(reset))
        .with_state(state)
}

/// Current turnaround status
pub async fn get_status(State(state): State<AppState>) -> Json<TurnaroundStatus> {
    Json(state.runner.status.borrow().clone())
}

/// Most recent events, oldest first
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let events = state
        .runner
        .events
        .recent(query.limit.unwrap_or(DEFAULT_EVENT_LIMIT));
    Json(EventsResponse {
        count: events.len(),
        events,
    })
}

/// Live events; slow clients skip what they missed
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream =
        BroadcastStream::new(state.runner.events.subscribe()).filter_map(|message| match message {
            Ok(envelope) => Event::default()
                .event("turnaround")
                .json_data(&envelope)
                .ok()
                .map(Ok),
            Err(e) => {
                warn!("event stream lagged: {e}");
                None
            }
        });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn get_config(State(state): State<AppState>) -> Json<TurnaroundConfig> {
    Json(state.config.as_ref().clone())
}

/// Clear every latch and return to preflight
pub async fn reset(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state
        .runner
        .commands
        .send(Command::Reset)
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, format!("Poll loop stopped: {e}")))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "command": "reset"
    })))
}
