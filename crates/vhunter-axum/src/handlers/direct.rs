//! Task-less download streamed straight back to the caller.

use std::path::PathBuf;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::HttpError;
use crate::handlers::files::attachment;
use crate::state::AppState;

/// How long the scratch file outlives the response.
const SCRATCH_RETENTION: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct DirectDownloadBody {
    pub url: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// `POST /direct-download`: fetch into the scratch directory and stream the
/// result as `video.mp4`. The file is deleted shortly afterwards.
pub async fn direct_download(
    State(state): State<AppState>,
    payload: Result<Json<DirectDownloadBody>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(body) = payload?;
    if body.url.trim().is_empty() {
        return Err(HttpError::BadRequest("Missing url parameter".to_string()));
    }

    let path = state
        .manager
        .direct_download(&body.url, body.format)
        .await?;
    info!(url = %body.url, path = %path.display(), "direct download ready");

    let response = attachment(&path, "video.mp4").await;
    schedule_removal(path, SCRATCH_RETENTION);
    response
}

fn schedule_removal(path: PathBuf, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "removed scratch file"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove scratch file"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scratch_file_is_removed_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.mp4");
        std::fs::write(&path, b"x").unwrap();

        schedule_removal(path.clone(), Duration::from_millis(200));
        assert!(path.exists());

        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!path.exists());
    }
}
