use axum::{extract::State, http::header, response::IntoResponse, Json};
use multiplexer_core::{Config, GateStatus, SlotPoolStatus};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

/// Occupancy snapshot of the admission gate and the shared fetch slots.
#[derive(Serialize)]
pub struct StatusResponse {
    pub admission: GateStatus,
    /// `None` when each batch gets its own slot pool.
    pub fetch_slots: Option<SlotPoolStatus>,
    pub max_batch_size: usize,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let dispatcher = state.dispatcher();
    Json(StatusResponse {
        admission: dispatcher.gate().status(),
        fetch_slots: dispatcher
            .multiplexer()
            .shared_slots()
            .map(|pool| pool.status()),
        max_batch_size: dispatcher.multiplexer().max_batch_size(),
    })
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
