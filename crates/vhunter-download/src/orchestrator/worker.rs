//! Task execution pipeline.
//!
//! The worker operates on a [`DownloadJob`] value and cloned [`WorkerDeps`];
//! it touches shared state only through the registry and the observer set.
//!
//! # Flow
//!
//! 1. claim the task (`pending → downloading`); a task whose token fired
//!    while queued is skipped and ends `cancelled`
//! 2. run the platform direct download when it applies, the generic transfer
//!    otherwise or when it fails
//! 3. forward progress through a throttled bridge task
//! 4. finalize: existence check, `<id>_` rename, sibling-audio remux, then
//!    `completed` at 100%; an abort marks the task `cancelled`, any other
//!    error marks it `failed`
//!
//! A terminal state is never overwritten: every mutation checks that the
//! task is still `downloading`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vhunter_core::{
    DirectDownloadPort, DownloadRequest, ProgressCallback, ProgressSample, Remuxer, TaskEvent,
    TaskId, TaskStatus, TransferPort, VideoError,
};

use super::observers::ObserverSet;
use super::registry::TaskRegistry;
use crate::artifact::classify::{MediaKind, has_format_marker, media_kind, strip_format_marker};
use crate::artifact::merged_path;
use crate::progress::ProgressThrottle;

pub(crate) const SOURCE_DIRECT: &str = "douyin_direct";
pub(crate) const SOURCE_TRANSFER: &str = "transfer";
pub(crate) const CAVEAT_SILENT_VIDEO: &str = "silent_video";

/// Dependencies for the worker, cloned per worker routine.
#[derive(Clone)]
pub(crate) struct WorkerDeps {
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) observers: Arc<ObserverSet>,
    pub transfer: Arc<dyn TransferPort>,
    pub direct: Option<Arc<dyn DirectDownloadPort>>,
    pub remuxer: Arc<dyn Remuxer>,
    /// Minimum time between broadcasts of small progress steps.
    pub progress_interval: Duration,
}

/// One queued unit of work.
pub(crate) struct DownloadJob {
    /// Request already bound to its task id.
    pub request: DownloadRequest,
    pub cancel: CancellationToken,
}

/// What a successful backend run produced.
struct Produced {
    path: PathBuf,
    title: Option<String>,
    source: &'static str,
}

/// Run one job to a terminal state.
pub(crate) async fn run_job(deps: &WorkerDeps, job: DownloadJob) {
    let Some(id) = job.request.task_id().cloned() else {
        error!(url = %job.request.url, "dequeued a request without a task id");
        return;
    };

    if !claim(deps, &id, &job.cancel).await {
        info!(task_id = %id, "task no longer pending, skipping");
        return;
    }

    let (tx, rx) = mpsc::unbounded_channel::<ProgressSample>();
    let bridge = spawn_progress_bridge(deps.clone(), id.clone(), rx);
    let callback: ProgressCallback = Arc::new(move |sample| {
        let _ = tx.send(sample);
    });

    let outcome = execute(deps, &id, &job, callback).await;
    // Every sender is gone once the backends return; the bridge drains and exits.
    let _ = bridge.await;

    match outcome {
        Ok(produced) => finalize(deps, &id, produced).await,
        Err(e) if e.is_cancelled() || job.cancel.is_cancelled() => {
            mark_cancelled(deps, &id).await;
        }
        Err(e) => mark_failed(deps, &id, &e).await,
    }
}

async fn claim(deps: &WorkerDeps, id: &TaskId, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        mark_cancelled(deps, id).await;
        return false;
    }
    let event = deps
        .registry
        .update(id, |entry| {
            (entry.task.status == TaskStatus::Pending)
                .then(|| entry.task.transition_to(TaskStatus::Downloading).ok())
                .flatten()
                .map(|()| TaskEvent::from_task(&entry.task))
        })
        .await
        .flatten();
    match event {
        Some(event) => {
            info!(task_id = %id, "task claimed");
            deps.observers.broadcast(&event).await;
            true
        }
        None => false,
    }
}

fn spawn_progress_bridge(
    deps: WorkerDeps,
    id: TaskId,
    mut rx: mpsc::UnboundedReceiver<ProgressSample>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut throttle = ProgressThrottle::new(deps.progress_interval);
        while let Some(sample) = rx.recv().await {
            let event = deps
                .registry
                .update(&id, |entry| {
                    entry.task.apply_progress(&sample);
                    (entry.task.status == TaskStatus::Downloading
                        && throttle.should_emit(entry.task.progress))
                    .then(|| TaskEvent::from_task(&entry.task))
                })
                .await
                .flatten();
            if let Some(event) = event {
                deps.observers.broadcast(&event).await;
            }
        }
    })
}

async fn execute(
    deps: &WorkerDeps,
    id: &TaskId,
    job: &DownloadJob,
    callback: ProgressCallback,
) -> Result<Produced, VideoError> {
    if let Some(direct) = deps.direct.as_ref().filter(|d| d.handles(&job.request.url)) {
        match direct
            .download(&job.request, Some(Arc::clone(&callback)), job.cancel.clone())
            .await
        {
            Ok(outcome) => {
                return Ok(Produced {
                    path: outcome.path,
                    title: outcome.title,
                    source: SOURCE_DIRECT,
                });
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => warn!(task_id = %id, error = %e, "direct download failed, falling back to transfer"),
        }
    }

    let path = deps
        .transfer
        .download(&job.request, Some(callback), job.cancel.clone())
        .await?;
    Ok(Produced {
        path,
        title: None,
        source: SOURCE_TRANSFER,
    })
}

async fn finalize(deps: &WorkerDeps, id: &TaskId, produced: Produced) {
    let path = produced.path;
    if tokio::fs::metadata(&path).await.is_err() {
        let e = VideoError::ArtifactNotFound {
            task_id: id.to_string(),
            dir: path.display().to_string(),
        };
        mark_failed(deps, id, &e).await;
        return;
    }

    let path = ensure_prefixed(id, path).await;
    let path = merge_sibling_audio(deps, id, path).await;
    let silent = has_format_marker(&file_name(&path)) && media_kind(&path) == MediaKind::Video;
    if silent {
        warn!(task_id = %id, path = %path.display(), "completing with a video-only file");
    }
    let size = tokio::fs::metadata(&path).await.ok().map(|m| m.len());

    let event = deps
        .registry
        .update(id, |entry| {
            let task = &mut entry.task;
            if task.status != TaskStatus::Downloading {
                return None;
            }
            task.complete(path.clone(), size).ok()?;
            if produced.title.is_some() {
                task.title.clone_from(&produced.title);
            }
            task.metadata
                .insert("source".to_string(), produced.source.to_string());
            if silent {
                task.metadata
                    .insert("caveat".to_string(), CAVEAT_SILENT_VIDEO.to_string());
            }
            Some(TaskEvent::from_task(task))
        })
        .await
        .flatten();

    if let Some(event) = event {
        info!(task_id = %id, path = %path.display(), size = ?size, "task completed");
        deps.observers.broadcast(&event).await;
    }
}

async fn mark_failed(deps: &WorkerDeps, id: &TaskId, err: &VideoError) {
    error!(task_id = %id, error = %err, "task failed");
    let message = err.to_string();
    let event = deps
        .registry
        .update(id, |entry| {
            (entry.task.status == TaskStatus::Downloading)
                .then(|| entry.task.fail(message).ok())
                .flatten()
                .map(|()| TaskEvent::from_task(&entry.task))
        })
        .await
        .flatten();
    if let Some(event) = event {
        deps.observers.broadcast(&event).await;
    }
}

/// Move a task that has not finished yet to `cancelled`.
///
/// Covers aborts that did not come through `cancel_task`, such as shutdown.
async fn mark_cancelled(deps: &WorkerDeps, id: &TaskId) {
    let event = deps
        .registry
        .update(id, |entry| {
            (!entry.task.status.is_terminal())
                .then(|| entry.task.cancel().ok())
                .flatten()
                .map(|_| TaskEvent::from_task(&entry.task))
        })
        .await
        .flatten();
    if let Some(event) = event {
        info!(task_id = %id, "task aborted, marked cancelled");
        deps.observers.broadcast(&event).await;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Rename to `<id>_<name>` when the name does not mention the task.
async fn ensure_prefixed(id: &TaskId, path: PathBuf) -> PathBuf {
    let name = file_name(&path);
    if name.contains(id.as_str()) {
        return path;
    }
    let renamed = path.with_file_name(format!("{}{name}", id.file_prefix()));
    match tokio::fs::rename(&path, &renamed).await {
        Ok(()) => {
            info!(task_id = %id, from = %path.display(), to = %renamed.display(), "renamed artifact");
            renamed
        }
        Err(e) => {
            warn!(task_id = %id, path = %path.display(), error = %e, "could not rename artifact");
            path
        }
    }
}

/// When the result is a split video stream, look for its audio next to it and remux.
async fn merge_sibling_audio(deps: &WorkerDeps, id: &TaskId, path: PathBuf) -> PathBuf {
    let name = file_name(&path);
    let is_split_mp4 = has_format_marker(&name)
        && path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("mp4"));
    if !is_split_mp4 {
        return path;
    }
    let Some(dir) = path.parent().map(Path::to_path_buf) else {
        return path;
    };
    let unmarked = strip_format_marker(&name);
    let Some(stem) = Path::new(&unmarked).file_stem().map(|s| format!("{}.", s.to_string_lossy())) else {
        return path;
    };

    let Some(audio) = find_audio_sibling(&dir, &stem).await else {
        return path;
    };
    if !deps.remuxer.is_available() {
        warn!(task_id = %id, "remuxer unavailable for sibling audio");
        return path;
    }
    let output = merged_path(&dir, id);
    match deps.remuxer.merge(&path, &audio, &output).await {
        Ok(()) => {
            info!(task_id = %id, output = %output.display(), "merged sibling audio");
            output
        }
        Err(e) => {
            warn!(task_id = %id, error = %e, "sibling remux failed");
            path
        }
    }
}

async fn find_audio_sibling(dir: &Path, stem_with_dot: &str) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut found = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if file_name(&path).starts_with(stem_with_dot) && media_kind(&path) == MediaKind::Audio {
            found.push(path);
        }
    }
    found.sort();
    found.into_iter().next()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use vhunter_core::Task;

    use super::*;

    struct NoRemux;

    #[async_trait]
    impl Remuxer for NoRemux {
        fn is_available(&self) -> bool {
            false
        }

        async fn merge(&self, _v: &Path, _a: &Path, _o: &Path) -> Result<(), VideoError> {
            Err(VideoError::invalid_input("unavailable"))
        }
    }

    #[tokio::test]
    async fn test_ensure_prefixed_renames() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("clip.mp4");
        std::fs::write(&plain, b"x").unwrap();
        let id = TaskId::from("T9");
        let renamed = ensure_prefixed(&id, plain).await;
        assert_eq!(renamed, dir.path().join("T9_clip.mp4"));
        assert!(renamed.exists());

        let kept = ensure_prefixed(&id, renamed.clone()).await;
        assert_eq!(kept, renamed);
    }

    #[tokio::test]
    async fn test_find_audio_sibling() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["T1_clip.f137.mp4", "T1_clip.f140.m4a", "T1_other.m4a"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = find_audio_sibling(dir.path(), "T1_clip.").await;
        assert_eq!(found, Some(dir.path().join("T1_clip.f140.m4a")));
        assert!(find_audio_sibling(dir.path(), "T2_clip.").await.is_none());
    }

    #[tokio::test]
    async fn test_sibling_merge_without_remuxer_keeps_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("T1_clip.f137.mp4");
        std::fs::write(&video, b"x").unwrap();
        std::fs::write(dir.path().join("T1_clip.f140.m4a"), b"x").unwrap();
        let out = merge_sibling_audio(&idle_deps(), &TaskId::from("T1"), video.clone()).await;
        assert_eq!(out, video);
    }

    #[tokio::test]
    async fn test_claim_after_abort_cancels_queued_task() {
        let deps = idle_deps();
        let id = TaskId::from("T1");
        let token = CancellationToken::new();
        deps.registry.insert(Task::new(id.clone()), token.clone()).await;
        token.cancel();

        assert!(!claim(&deps, &id, &token).await);
        assert_eq!(deps.registry.get(&id).await.unwrap().status, TaskStatus::Cancelled);

        // Already terminal: nothing changes.
        mark_cancelled(&deps, &id).await;
        assert_eq!(deps.registry.get(&id).await.unwrap().status, TaskStatus::Cancelled);
    }

    fn idle_deps() -> WorkerDeps {
        WorkerDeps {
            registry: Arc::default(),
            observers: Arc::default(),
            transfer: Arc::new(UnusedTransfer),
            direct: None,
            remuxer: Arc::new(NoRemux),
            progress_interval: Duration::from_secs(1),
        }
    }

    struct UnusedTransfer;

    #[async_trait]
    impl TransferPort for UnusedTransfer {
        async fn download(
            &self,
            _request: &DownloadRequest,
            _on_progress: Option<ProgressCallback>,
            _cancel: CancellationToken,
        ) -> Result<PathBuf, VideoError> {
            Err(VideoError::invalid_input("not used"))
        }
    }
}
