use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::types::TaskId;
use crate::errors::VideoError;

/// A caller's request to fetch one video.
///
/// The task id is not part of the wire format: the orchestrator assigns it
/// exactly once at admission, and every artifact path is derived from it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Page or media URL.
    pub url: String,
    /// Optional output file name; only its basename is honored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Downloader format selector; defaults to best video+audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Extra HTTP headers forwarded to the downloader.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Path to a cookies file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    /// Referer override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    /// Free-form downloader options (`key → value`, empty value = bare flag).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    /// Caller annotations copied onto the task.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Whether the client intends to pull the artifact afterwards.
    #[serde(default)]
    pub save_to_local: bool,
    #[serde(skip)]
    task_id: Option<TaskId>,
}

impl DownloadRequest {
    /// Request for `url` with every other field defaulted.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Check the URL before admission.
    pub fn validate(&self) -> Result<(), VideoError> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(VideoError::InvalidInput("url is required".to_string()));
        }
        let parsed =
            url::Url::parse(raw).map_err(|_| VideoError::UnsupportedUrl(raw.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            _ => Err(VideoError::UnsupportedUrl(raw.to_string())),
        }
    }

    /// Bind the request to its task. Fails if already bound.
    pub fn assign_task_id(&mut self, id: TaskId) -> Result<(), VideoError> {
        if let Some(existing) = &self.task_id {
            return Err(VideoError::InvalidInput(format!(
                "request already bound to task {existing}"
            )));
        }
        self.task_id = Some(id);
        Ok(())
    }

    /// The bound task id, if admission has happened.
    #[must_use]
    pub const fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_and_non_http() {
        assert!(matches!(
            DownloadRequest::new("  ").validate(),
            Err(VideoError::InvalidInput(_))
        ));
        assert!(matches!(
            DownloadRequest::new("ftp://host/file").validate(),
            Err(VideoError::UnsupportedUrl(_))
        ));
        assert!(matches!(
            DownloadRequest::new("not a url").validate(),
            Err(VideoError::UnsupportedUrl(_))
        ));
        assert!(DownloadRequest::new("https://example.com/v/1").validate().is_ok());
    }

    #[test]
    fn test_task_id_is_assigned_once() {
        let mut req = DownloadRequest::new("https://example.com/v/1");
        assert!(req.task_id().is_none());
        req.assign_task_id(TaskId::from("a")).unwrap();
        assert!(req.assign_task_id(TaskId::from("b")).is_err());
        assert_eq!(req.task_id().unwrap().as_str(), "a");
    }

    #[test]
    fn test_task_id_is_not_accepted_from_the_wire() {
        let req: DownloadRequest =
            serde_json::from_str(r#"{"url":"https://x.test/v","task_id":"forged"}"#).unwrap();
        assert!(req.task_id().is_none());
        assert!(!req.save_to_local);
    }
}
