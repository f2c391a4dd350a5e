//! Video metadata handler.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::Deserialize;

use vhunter_core::{VideoDescriptor, VideoError};

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VideoInfoQuery {
    pub url: Option<String>,
}

/// `GET /api/video-info?url=...`
///
/// A resolution failure with a known remediation is still a 200: the body is
/// the descriptor with `can_download = false` and its suggestions.
pub async fn video_info(
    State(state): State<AppState>,
    query: Result<Query<VideoInfoQuery>, QueryRejection>,
) -> Result<Json<VideoDescriptor>, HttpError> {
    let Query(query) = query?;
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| HttpError::BadRequest("Missing url parameter".to_string()))?;

    match state.manager.resolve_video_info(&url).await {
        Ok(descriptor) => Ok(Json(descriptor)),
        Err(VideoError::Unresolved { descriptor, .. }) => Ok(Json(*descriptor)),
        Err(e) => Err(e.into()),
    }
}
