//! ffmpeg-backed [`Remuxer`].

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vhunter_core::{Remuxer, VideoError};

use crate::process::{command_line, resolve_tool, run_captured};

/// Copies the video stream and re-encodes audio to AAC.
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    program: String,
}

impl FfmpegRemuxer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        [
            "-i".to_string(),
            video.display().to_string(),
            "-i".to_string(),
            audio.display().to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-strict".to_string(),
            "experimental".to_string(),
            "-y".to_string(),
            output.display().to_string(),
        ]
        .into()
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    fn is_available(&self) -> bool {
        resolve_tool(&self.program).is_ok()
    }

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), VideoError> {
        let program = resolve_tool(&self.program)?;
        let args = Self::merge_args(video, audio, output);
        let command = command_line(&program, &args);
        debug!(command = %command, "running remux");

        // Not tied to task cancellation.
        let result = run_captured(&program, &args, &CancellationToken::new()).await?;
        if !result.success {
            return Err(result.into_failure(command));
        }
        info!(output = %output.display(), "merged video and audio");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_args() {
        let args = FfmpegRemuxer::merge_args(
            Path::new("/o/T1_a.f137.mp4"),
            Path::new("/o/T1_a.f140.m4a"),
            Path::new("/o/T1_merged.mp4"),
        );
        assert_eq!(
            args.join(" "),
            "-i /o/T1_a.f137.mp4 -i /o/T1_a.f140.m4a -c:v copy -c:a aac -strict experimental -y /o/T1_merged.mp4"
        );
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let remuxer = FfmpegRemuxer::new(dir.path().join("ffmpeg").display().to_string());
        assert!(!remuxer.is_available());
    }
}
