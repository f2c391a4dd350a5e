//! Remux port: merge a video-only and an audio-only stream.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::VideoError;

#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Whether the remux tool can be invoked at all.
    fn is_available(&self) -> bool;

    /// Combine `video` and `audio` into `output`, copying the video stream.
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), VideoError>;
}
