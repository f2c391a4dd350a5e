//! Liveness endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use vhunter_core::TaskStatus;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub tasks: usize,
    pub active: usize,
    pub observers: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let manager = &state.manager;
    Json(HealthResponse {
        status: "ok",
        service: "video-hunter",
        tasks: manager.task_count().await,
        active: manager.count_in(TaskStatus::Downloading).await,
        observers: manager.observer_count().await,
    })
}
