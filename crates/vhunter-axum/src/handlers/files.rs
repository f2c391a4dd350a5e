//! Serving completed artifacts as attachments.

use std::path::Path;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use vhunter_core::{TaskId, TaskStatus};
use vhunter_download::artifact::classify::friendly_filename;

use crate::error::HttpError;
use crate::state::AppState;

/// `GET /api/downloads/{id}/download`: stream the task's file.
///
/// The attachment name drops the task prefix, any per-format marker and the
/// `_merged` suffix.
pub async fn download(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Response, HttpError> {
    let id = TaskId::from(id);
    let task = state.manager.get_task(&id).await?;
    if task.status != TaskStatus::Completed {
        return Err(HttpError::BadRequest(format!(
            "Download is not complete (status: {})",
            task.status
        )));
    }
    let path = task
        .file
        .ok_or_else(|| HttpError::NotFound("Task has no file".to_string()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let friendly = friendly_filename(&name, &id.file_prefix());
    info!(task_id = %id, path = %path.display(), filename = %friendly, "serving artifact");
    attachment(&path, &friendly).await
}

/// Stream `path` as an `application/octet-stream` attachment named `filename`.
pub(crate) async fn attachment(path: &Path, filename: &str) -> Result<Response, HttpError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "artifact unreadable");
            return Err(HttpError::NotFound("File does not exist or is not accessible".to_string()));
        }
    };
    let length = file.metadata().await.ok().map(|m| m.len());

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&content_disposition(filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    Ok(response)
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("clip.mp4"),
            "attachment; filename=\"clip.mp4\"; filename*=UTF-8''clip.mp4"
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition("舞蹈 \"x\".mp4");
        assert!(value.starts_with("attachment; filename=\"__ _x_.mp4\";"));
        assert!(value.contains("filename*=UTF-8''%E8%88%9E"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }
}
