//! Transfer ports: the generic downloader and platform direct downloads.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::VideoError;
use crate::task::{DownloadRequest, ProgressSample};

/// Progress sink handed to a transfer. Called from reader tasks, so it must
/// be cheap and non-blocking.
pub type ProgressCallback = Arc<dyn Fn(ProgressSample) + Send + Sync>;

/// The generic download backend.
#[async_trait]
pub trait TransferPort: Send + Sync {
    /// Download `request` and return the path of the produced artifact.
    ///
    /// The request must already be bound to a task id. Returns only after
    /// the backend's output has been fully drained and the artifact located.
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<PathBuf, VideoError>;
}

/// Result of a successful platform direct download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectOutcome {
    pub path: PathBuf,
    pub title: Option<String>,
}

/// A platform-specific fast path tried before the generic backend.
#[async_trait]
pub trait DirectDownloadPort: Send + Sync {
    /// Whether this backend recognizes the URL.
    fn handles(&self, url: &str) -> bool;

    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<DirectOutcome, VideoError>;
}
