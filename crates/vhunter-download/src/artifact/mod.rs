//! File resolution and remux engine.
//!
//! The transfer tool picks the final file name itself, so after a run the
//! artifact has to be found on disk. Every name the engine produces starts
//! with `<task id>_`; that prefix is how files are attributed.
//!
//! # Resolution order
//!
//! 1. a merged candidate (video extension, no format marker)
//! 2. split video + audio, remuxed into `<id>_merged.mp4` (video alone when
//!    the remux is unavailable or fails)
//! 3. the split video, then the audio
//! 4. any other file with the prefix
//! 5. the most recently modified file, only when inside the stale window

pub mod classify;
pub mod remux;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use vhunter_core::{Remuxer, TaskId, VideoError};

use classify::{MediaKind, has_format_marker, is_noise, media_kind};
pub use remux::FfmpegRemuxer;

/// Name of the merge output for a task.
pub fn merged_path(dir: &Path, id: &TaskId) -> PathBuf {
    dir.join(format!("{}merged.mp4", id.file_prefix()))
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    name: String,
    modified: SystemTime,
}

/// Prefix-matched entries split by role.
#[derive(Debug, Default)]
struct Candidates {
    merged: Option<PathBuf>,
    video: Option<PathBuf>,
    audio: Option<PathBuf>,
    other: Option<PathBuf>,
}

impl Candidates {
    fn classify(entries: &[Entry], id: &TaskId) -> Option<Self> {
        let mut found = Self::default();
        let mut any = false;
        for entry in entries.iter().filter(|e| id.owns_file_name(&e.name)) {
            any = true;
            let slot = match (media_kind(&entry.path), has_format_marker(&entry.name)) {
                (MediaKind::Video, false) => &mut found.merged,
                (MediaKind::Video, true) => &mut found.video,
                (MediaKind::Audio, _) => &mut found.audio,
                (MediaKind::Other, _) => &mut found.other,
            };
            slot.get_or_insert_with(|| entry.path.clone());
        }
        any.then_some(found)
    }
}

/// Locates a task's artifact in the output directory.
pub struct ArtifactResolver {
    output_dir: PathBuf,
    stale_window: Duration,
    remuxer: Arc<dyn Remuxer>,
}

impl ArtifactResolver {
    pub fn new(output_dir: impl Into<PathBuf>, stale_window: Duration, remuxer: Arc<dyn Remuxer>) -> Self {
        Self {
            output_dir: output_dir.into(),
            stale_window,
            remuxer,
        }
    }

    /// Find the artifact produced for `id` from the run that used `template`.
    pub async fn resolve_artifact(&self, template: &Path, id: &TaskId) -> Result<PathBuf, VideoError> {
        debug!(task_id = %id, template = %template.display(), "resolving artifact on disk");
        let entries = self.list_entries().await?;

        if let Some(found) = Candidates::classify(&entries, id) {
            if let Some(merged) = found.merged {
                return Ok(merged);
            }
            if let (Some(video), Some(audio)) = (&found.video, &found.audio) {
                return Ok(self.merge_pair(video, audio, id).await);
            }
            if let Some(single) = found.video.or(found.audio).or(found.other) {
                return Ok(single);
            }
        }

        self.latest_within_window(&entries, id)
    }

    /// Remux `video` + `audio` into `<id>_merged.mp4`.
    ///
    /// Falls back to the silent video when the remux cannot run or fails.
    pub async fn merge_pair(&self, video: &Path, audio: &Path, id: &TaskId) -> PathBuf {
        let dir = video.parent().unwrap_or(&self.output_dir);
        let output = merged_path(dir, id);
        if !self.remuxer.is_available() {
            warn!(task_id = %id, video = %video.display(), "remuxer unavailable, keeping silent video");
            return video.to_path_buf();
        }
        match self.remuxer.merge(video, audio, &output).await {
            Ok(()) => {
                info!(task_id = %id, output = %output.display(), "merged split streams");
                output
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "remux failed, keeping silent video");
                video.to_path_buf()
            }
        }
    }

    async fn list_entries(&self) -> Result<Vec<Entry>, VideoError> {
        let mut dir = tokio::fs::read_dir(&self.output_dir)
            .await
            .map_err(|e| VideoError::io_context(format!("list {}", self.output_dir.display()), &e))?;
        let mut entries = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            if is_noise(&name) {
                continue;
            }
            let Ok(meta) = item.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            entries.push(Entry {
                path: item.path(),
                name,
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn latest_within_window(&self, entries: &[Entry], id: &TaskId) -> Result<PathBuf, VideoError> {
        let Some(latest) = entries.iter().max_by_key(|e| e.modified) else {
            return Err(VideoError::ArtifactNotFound {
                task_id: id.to_string(),
                dir: self.output_dir.display().to_string(),
            });
        };
        let age = SystemTime::now()
            .duration_since(latest.modified)
            .unwrap_or_default();
        if age > self.stale_window {
            return Err(VideoError::StaleArtifact {
                path: latest.path.display().to_string(),
                modified_secs_ago: age.as_secs(),
            });
        }
        warn!(task_id = %id, path = %latest.path.display(), "no prefixed artifact, using most recent file");
        Ok(latest.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use async_trait::async_trait;
    use mockall::mock;

    use super::*;

    mock! {
        pub Remux {}

        #[async_trait]
        impl Remuxer for Remux {
            fn is_available(&self) -> bool;
            async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), VideoError>;
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    fn resolver(dir: &Path, remuxer: MockRemux) -> ArtifactResolver {
        ArtifactResolver::new(dir, Duration::from_secs(300), Arc::new(remuxer))
    }

    fn unused_remuxer() -> MockRemux {
        let mut remux = MockRemux::new();
        remux.expect_is_available().never();
        remux.expect_merge().never();
        remux
    }

    #[tokio::test]
    async fn test_prefixed_file_beats_unrelated_newer_file() {
        let dir = tempfile::tempdir().unwrap();
        let ours = touch(dir.path(), "T1_video.mp4");
        touch(dir.path(), "other.mp4");
        let id = TaskId::from("T1");
        let found = resolver(dir.path(), unused_remuxer())
            .resolve_artifact(&dir.path().join("T1_%(title)s.%(ext)s"), &id)
            .await
            .unwrap();
        assert_eq!(found, ours);
    }

    #[tokio::test]
    async fn test_split_pair_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "T1_video.f100.mp4");
        touch(dir.path(), "T1_audio.m4a");
        touch(dir.path(), ".DS_Store");

        let mut remux = MockRemux::new();
        remux.expect_is_available().return_const(true);
        remux.expect_merge().times(1).returning(|_, _, output| {
            std::fs::write(output, b"merged").unwrap();
            Ok(())
        });

        let id = TaskId::from("T1");
        let found = resolver(dir.path(), remux)
            .resolve_artifact(&dir.path().join("T1_x"), &id)
            .await
            .unwrap();
        assert_eq!(found, dir.path().join("T1_merged.mp4"));
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "T1_video.f100.mp4");
        touch(dir.path(), "T1_audio.m4a");

        let mut remux = MockRemux::new();
        remux.expect_is_available().return_const(true);
        remux
            .expect_merge()
            .returning(|_, _, _| Err(VideoError::invalid_input("boom")));

        let found = resolver(dir.path(), remux)
            .resolve_artifact(&dir.path().join("T1_x"), &TaskId::from("T1"))
            .await
            .unwrap();
        assert_eq!(found, video);
    }

    #[tokio::test]
    async fn test_unavailable_remuxer_keeps_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "T1_video.f100.mp4");
        touch(dir.path(), "T1_audio.m4a");

        let mut remux = MockRemux::new();
        remux.expect_is_available().return_const(false);
        remux.expect_merge().never();

        let found = resolver(dir.path(), remux)
            .resolve_artifact(&dir.path().join("T1_x"), &TaskId::from("T1"))
            .await
            .unwrap();
        assert_eq!(found, video);
    }

    #[tokio::test]
    async fn test_merged_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "T1_clip.f137.mp4");
        touch(dir.path(), "T1_clip.f140.m4a");
        let merged = touch(dir.path(), "T1_clip.mp4");
        let found = resolver(dir.path(), unused_remuxer())
            .resolve_artifact(&dir.path().join("T1_x"), &TaskId::from("T1"))
            .await
            .unwrap();
        assert_eq!(found, merged);
    }

    #[tokio::test]
    async fn test_stale_fallback_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let old = touch(dir.path(), "unrelated.mp4");
        File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(360))
            .unwrap();

        let err = resolver(dir.path(), unused_remuxer())
            .resolve_artifact(&dir.path().join("T1_x"), &TaskId::from("T1"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, VideoError::StaleArtifact { modified_secs_ago, .. } if modified_secs_ago >= 359)
        );
    }

    #[tokio::test]
    async fn test_recent_fallback_and_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), unused_remuxer());
        let id = TaskId::from("T1");
        let err = r.resolve_artifact(&dir.path().join("T1_x"), &id).await.unwrap_err();
        assert!(matches!(err, VideoError::ArtifactNotFound { .. }));

        let fresh = touch(dir.path(), "fresh.webm");
        assert_eq!(r.resolve_artifact(&dir.path().join("T1_x"), &id).await.unwrap(), fresh);
    }
}
