//! Download task handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Serialize;

use vhunter_core::{DownloadRequest, Task, TaskId};

use crate::error::HttpError;
use crate::state::AppState;

/// Response from `clear`.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: &'static str,
    pub removed: usize,
}

/// `POST /api/download`: admit a request, returning the task in `pending`.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<Task>, HttpError> {
    let Json(request) = payload?;
    let task = state.manager.create_task(request).await?;
    Ok(Json(task))
}

/// `GET /api/downloads`: every task, oldest first.
pub async fn list(State(state): State<AppState>) -> Json<Vec<Task>> {
    Json(state.manager.list_tasks().await)
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, HttpError> {
    Ok(Json(state.manager.get_task(&TaskId::from(id)).await?))
}

/// `POST /api/downloads/{id}/cancel`.
///
/// Repeating a cancel is harmless; cancelling a finished task is a 409.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, HttpError> {
    Ok(Json(state.manager.cancel_task(&TaskId::from(id)).await?))
}

/// `POST /api/downloads/clear`.
pub async fn clear(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.manager.clear_tasks().await;
    Json(ClearResponse {
        message: "All download records cleared",
        removed,
    })
}
