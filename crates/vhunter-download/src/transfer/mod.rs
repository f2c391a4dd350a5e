//! Transfer process driver.
//!
//! Runs the download tool for one request and returns the artifact path.
//!
//! # Output handling
//!
//! stdout and stderr are drained by two reader tasks. Each line is checked
//! for a destination announcement, a merge target and a progress reading;
//! progress goes straight to the caller's callback. Both readers are joined
//! before the exit status is awaited, so no trailing output is lost.
//!
//! # Cancellation
//!
//! The task's token is watched while draining and while waiting; when it
//! fires the child is killed and [`VideoError::Cancelled`] is returned.

pub mod args;
pub mod progress;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vhunter_core::{
    DownloadRequest, ProgressCallback, Remuxer, Settings, TaskId, TransferPort, VideoError,
};

use crate::artifact::ArtifactResolver;
use crate::artifact::classify::{MediaKind, media_kind};
use crate::process::{command_line, resolve_tool};
pub use args::{ArgsContext, build_transfer_args, output_template};
pub use progress::{StreamKind, destination_of, merge_target_of, parse_progress_line};

/// Paths announced by the tool during one run.
#[derive(Debug, Default)]
struct Announcements {
    destinations: Vec<PathBuf>,
    merge_target: Option<PathBuf>,
}

impl Announcements {
    fn record(&mut self, line: &str, stream: StreamKind) {
        if let Some(target) = merge_target_of(line) {
            self.merge_target = Some(target);
        } else if let Some(dest) = destination_of(line, stream) {
            self.destinations.push(dest);
        }
    }

    /// Last announced video-only and audio-only streams, when both were seen.
    fn split_pair(&self) -> Option<(PathBuf, PathBuf)> {
        let last_of = |kind| {
            self.destinations
                .iter()
                .rev()
                .find(|p| media_kind(p) == kind)
                .cloned()
        };
        Some((last_of(MediaKind::Video)?, last_of(MediaKind::Audio)?))
    }
}

/// The [`TransferPort`] backed by yt-dlp.
pub struct TransferDriver {
    program: String,
    output_dir: PathBuf,
    args_ctx: ArgsContext,
    artifacts: ArtifactResolver,
}

impl TransferDriver {
    /// Driver writing into `output_dir`.
    pub fn new(settings: &Settings, output_dir: impl Into<PathBuf>, remuxer: Arc<dyn Remuxer>) -> Self {
        let output_dir = output_dir.into();
        let ffmpeg = &settings.downloader.ffmpeg_path;
        let args_ctx = ArgsContext {
            user_agent: settings.ytdlp.user_agent.clone(),
            mobile_user_agent: settings.douyin.mobile_user_agent.clone(),
            ffmpeg_location: resolve_tool(ffmpeg).is_ok().then(|| ffmpeg.clone()),
            cookies_file: settings.ytdlp.cookies_file.clone(),
            proxy: settings.ytdlp.proxy.clone(),
        };
        let artifacts = ArtifactResolver::new(
            output_dir.clone(),
            std::time::Duration::from_secs(settings.downloader.stale_window_secs),
            remuxer,
        );
        Self {
            program: settings.ytdlp.path.clone(),
            output_dir,
            args_ctx,
            artifacts,
        }
    }

    async fn run(
        &self,
        id: &TaskId,
        request: &DownloadRequest,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, VideoError> {
        let program = resolve_tool(&self.program)?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| VideoError::io_context(format!("create {}", self.output_dir.display()), &e))?;

        let template = output_template(&self.output_dir, id, request.output.as_deref());
        let args = build_transfer_args(request, &template, &self.args_ctx);
        let command = command_line(&program, &args);
        info!(task_id = %id, url = %request.url, "starting transfer");
        debug!(task_id = %id, command = %command, "transfer command");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VideoError::tool_unavailable(program.display().to_string(), e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::tool_unavailable(&self.program, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VideoError::tool_unavailable(&self.program, "stderr not captured"))?;

        let announcements = Arc::new(Mutex::new(Announcements::default()));
        let out_task = spawn_reader(stdout, StreamKind::Stdout, id.clone(), Arc::clone(&announcements), on_progress.clone());
        let err_task = spawn_reader(stderr, StreamKind::Stderr, id.clone(), Arc::clone(&announcements), on_progress);

        let drained = tokio::select! {
            biased;

            () = cancel.cancelled() => None,

            joined = async { tokio::join!(out_task, err_task) } => Some(joined),
        };
        let Some((out, err)) = drained else {
            return Err(abort(&mut child, id).await);
        };
        let stdout_text = out.unwrap_or_default();
        let stderr_text = err.unwrap_or_default();

        let waited = tokio::select! {
            biased;

            () = cancel.cancelled() => None,

            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            return Err(abort(&mut child, id).await);
        };
        let status: ExitStatus = status.map_err(|e| VideoError::io_context("wait for transfer", &e))?;

        let announced = std::mem::take(&mut *announcements.lock().unwrap_or_else(PoisonError::into_inner));

        if !status.success() {
            return self
                .recover_failed_run(id, &announced, command, status.code(), stdout_text, stderr_text)
                .await;
        }

        self.locate_artifact(id, &template, &announced).await
    }

    /// Salvage a failed run when both split streams landed, else report it.
    async fn recover_failed_run(
        &self,
        id: &TaskId,
        announced: &Announcements,
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    ) -> Result<PathBuf, VideoError> {
        if let Some((video, audio)) = announced.split_pair() {
            if video.exists() && audio.exists() {
                warn!(task_id = %id, code = ?code, "transfer failed after both streams landed, merging them");
                return Ok(self.artifacts.merge_pair(&video, &audio, id).await);
            }
        }

        if stderr.contains("cookies") {
            return Err(VideoError::LoginRequired(stderr.trim().to_string()));
        }

        Err(VideoError::ProcessFailed {
            command,
            status: code,
            stdout,
            stderr,
        })
    }

    /// Turn what the tool announced into an existing, attributed path.
    async fn locate_artifact(
        &self,
        id: &TaskId,
        template: &Path,
        announced: &Announcements,
    ) -> Result<PathBuf, VideoError> {
        let candidate = if let Some(target) = &announced.merge_target {
            target.clone()
        } else if let Some((video, audio)) = announced.split_pair().filter(|(v, a)| v.exists() && a.exists()) {
            self.artifacts.merge_pair(&video, &audio, id).await
        } else if let Some(last) = announced.destinations.last() {
            last.clone()
        } else {
            debug!(task_id = %id, "no destination announced, inspecting output directory");
            return self.resolve_attributed(template, id).await;
        };

        if candidate.exists() {
            return Ok(candidate);
        }

        if let Some(name) = candidate.file_name() {
            let relocated = self.output_dir.join(name);
            if relocated.exists() {
                return Ok(relocated);
            }
        }

        match self.resolve_attributed(template, id).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(task_id = %id, path = %candidate.display(), error = %e, "announced artifact is missing");
                Ok(template.to_path_buf())
            }
        }
    }

    async fn resolve_attributed(&self, template: &Path, id: &TaskId) -> Result<PathBuf, VideoError> {
        let found = self.artifacts.resolve_artifact(template, id).await?;
        let attributed = found
            .file_name()
            .is_some_and(|n| n.to_string_lossy().contains(id.as_str()));
        if attributed {
            Ok(found)
        } else {
            warn!(task_id = %id, path = %found.display(), "recent file does not belong to task");
            Err(VideoError::ArtifactNotFound {
                task_id: id.to_string(),
                dir: self.output_dir.display().to_string(),
            })
        }
    }
}

#[async_trait]
impl TransferPort for TransferDriver {
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<PathBuf, VideoError> {
        let id = request
            .task_id()
            .cloned()
            .ok_or_else(|| VideoError::invalid_input("request is not bound to a task"))?;
        self.run(&id, request, on_progress, &cancel).await
    }
}

async fn abort(child: &mut Child, id: &TaskId) -> VideoError {
    warn!(task_id = %id, "cancelling transfer");
    let _ = child.kill().await;
    VideoError::Cancelled
}

/// Drain one pipe line by line; returns everything read.
fn spawn_reader<R>(
    reader: R,
    stream: StreamKind,
    id: TaskId,
    announcements: Arc<Mutex<Announcements>>,
    on_progress: Option<ProgressCallback>,
) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut captured = String::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(task_id = %id, stream = stream.as_str(), error = %e, "pipe read failed");
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            captured.push_str(line);
            captured.push('\n');
            debug!(task_id = %id, stream = stream.as_str(), "{line}");

            announcements
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(line, stream);

            if let Some(callback) = &on_progress {
                if let Some(sample) = parse_progress_line(line) {
                    callback(sample);
                }
            }
        }
        captured
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    struct NoRemux;

    #[cfg(unix)]
    #[async_trait]
    impl Remuxer for NoRemux {
        fn is_available(&self) -> bool {
            false
        }

        async fn merge(&self, _v: &Path, _a: &Path, _o: &Path) -> Result<(), VideoError> {
            Err(VideoError::invalid_input("no remuxer"))
        }
    }

    /// Driver running `body` as the download tool, writing into `<dir>/out`.
    #[cfg(unix)]
    fn scripted_driver(dir: &Path, body: &str) -> TransferDriver {
        use std::os::unix::fs::PermissionsExt;

        let out_dir = dir.join("out");
        std::fs::create_dir_all(&out_dir).unwrap();
        let script = dir.join("fake-ytdlp");
        std::fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut settings = Settings::with_defaults();
        settings.ytdlp.path = script.display().to_string();
        TransferDriver::new(&settings, &out_dir, Arc::new(NoRemux))
    }

    #[cfg(unix)]
    fn bound_request() -> DownloadRequest {
        let mut req = DownloadRequest::new("https://example.com/v");
        req.assign_task_id(TaskId::from("T1")).unwrap();
        req
    }

    #[test]
    fn test_announcements_track_split_pair_and_merge() {
        let mut a = Announcements::default();
        a.record("[download] Destination: /o/T1_c.f137.mp4", StreamKind::Stderr);
        assert!(a.split_pair().is_none());
        a.record("[download] Destination: /o/T1_c.f140.m4a", StreamKind::Stderr);
        assert_eq!(
            a.split_pair(),
            Some((PathBuf::from("/o/T1_c.f137.mp4"), PathBuf::from("/o/T1_c.f140.m4a")))
        );
        a.record(r#"[Merger] Merging formats into "/o/T1_c.mp4""#, StreamKind::Stdout);
        assert_eq!(a.merge_target, Some(PathBuf::from("/o/T1_c.mp4")));
        assert_eq!(a.destinations.len(), 2);
    }

    #[tokio::test]
    async fn test_unbound_request_is_rejected() {
        let settings = Settings::with_defaults();
        let dir = tempfile::tempdir().unwrap();
        let driver = TransferDriver::new(
            &settings,
            dir.path(),
            Arc::new(crate::artifact::FfmpegRemuxer::new("ffmpeg")),
        );
        let err = driver
            .download(&DownloadRequest::new("https://example.com/v"), None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let mut settings = Settings::with_defaults();
        let dir = tempfile::tempdir().unwrap();
        settings.ytdlp.path = dir.path().join("no-yt-dlp").display().to_string();
        let driver = TransferDriver::new(
            &settings,
            dir.path(),
            Arc::new(crate::artifact::FfmpegRemuxer::new("ffmpeg")),
        );
        let mut req = DownloadRequest::new("https://example.com/v");
        req.assign_task_id(TaskId::from("T1")).unwrap();
        let err = driver.download(&req, None, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, VideoError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scripted_tool_run() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let script = dir.path().join("fake-ytdlp");
        let target = out_dir.join("T1_clip.mp4");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf 'x' > '{t}'\necho '[download] Destination: {t}'\necho '[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01'\necho '[download] 100% of 1.00MiB' >&2\n",
                t = target.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::create_dir_all(&out_dir).unwrap();

        let mut settings = Settings::with_defaults();
        settings.ytdlp.path = script.display().to_string();
        let driver = TransferDriver::new(
            &settings,
            &out_dir,
            Arc::new(crate::artifact::FfmpegRemuxer::new("ffmpeg")),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |s| sink.lock().unwrap().push(s.percent));

        let mut req = DownloadRequest::new("https://example.com/v");
        req.assign_task_id(TaskId::from("T1")).unwrap();
        let path = driver
            .download(&req, Some(callback), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, target);
        let mut percents = seen.lock().unwrap().clone();
        percents.sort_by(f64::total_cmp);
        assert_eq!(percents, [50.0, 100.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_run_with_both_streams_keeps_silent_video() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let video = out.join("T1_c.f137.mp4");
        let audio = out.join("T1_c.f140.m4a");
        let driver = scripted_driver(
            dir.path(),
            &format!(
                "printf 'v' > '{v}'\nprintf 'a' > '{a}'\necho '[download] Destination: {v}' >&2\necho '[download] Destination: {a}' >&2\necho 'ERROR: Postprocessing: merge failed' >&2\nexit 1\n",
                v = video.display(),
                a = audio.display()
            ),
        );

        let path = driver
            .download(&bound_request(), None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, video);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_run_reports_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let driver = scripted_driver(dir.path(), "echo OUTTEXT\necho ERRTEXT >&2\nexit 2\n");

        let err = driver
            .download(&bound_request(), None, CancellationToken::new())
            .await
            .unwrap_err();
        match &err {
            VideoError::ProcessFailed {
                status,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(*status, Some(2));
                assert!(stdout.contains("OUTTEXT"));
                assert!(stderr.contains("ERRTEXT"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let text = err.to_string();
        assert!(text.contains("OUTTEXT") && text.contains("ERRTEXT"), "{text}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unannounced_artifact_is_found_by_task_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let driver = scripted_driver(
            dir.path(),
            &format!(
                "printf 'x' > '{o}/other.mp4'\nprintf 'x' > '{o}/T1_clip.mp4'\necho '[download] 100% of 1.00MiB'\n",
                o = out.display()
            ),
        );

        let path = driver
            .download(&bound_request(), None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, out.join("T1_clip.mp4"));
    }
}
