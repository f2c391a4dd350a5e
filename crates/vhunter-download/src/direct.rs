//! Direct HTTP download of a resolved Douyin media URL.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vhunter_core::{
    DirectDownloadPort, DirectOutcome, DownloadRequest, ProgressCallback, ProgressSample,
    Settings, VideoError,
};

use crate::artifact::classify::sanitize_component;
use crate::platform::api::DOUYIN_REFERER;
use crate::platform::{DouyinResolver, is_douyin_url};

const MAX_NAME_CHARS: usize = 80;

/// Douyin fast path: resolve the media URL, then stream it to disk.
pub struct DouyinDirect {
    resolver: Arc<DouyinResolver>,
    http: reqwest::Client,
    output_dir: PathBuf,
    user_agent: String,
}

impl DouyinDirect {
    pub fn new(
        settings: &Settings,
        resolver: Arc<DouyinResolver>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            http: reqwest::Client::new(),
            output_dir: output_dir.into(),
            user_agent: settings.douyin.mobile_user_agent.clone(),
        }
    }

    async fn stream_to_file(
        &self,
        media_url: &str,
        path: &Path,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<(), VideoError> {
        let response = self
            .http
            .get(media_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::REFERER, DOUYIN_REFERER)
            .send()
            .await
            .map_err(|e| VideoError::network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(VideoError::network_with_status(
                format!("media request returned {status}"),
                status.as_u16(),
            ));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| VideoError::io_context(format!("create {}", path.display()), &e))?;
        let started = Instant::now();
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| VideoError::network(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(callback) = on_progress {
                callback(sample_for(written, total, started.elapsed().as_secs_f64()));
            }
        }
        file.flush().await?;
        debug!(path = %path.display(), bytes = written, "media stream finished");
        Ok(())
    }
}

#[async_trait]
impl DirectDownloadPort for DouyinDirect {
    fn handles(&self, url: &str) -> bool {
        is_douyin_url(url)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<DirectOutcome, VideoError> {
        let id = request
            .task_id()
            .cloned()
            .ok_or_else(|| VideoError::invalid_input("request is not bound to a task"))?;
        let media = self.resolver.try_direct_resolve(&request.url, &cancel).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let stem: String = media
            .title
            .as_deref()
            .map_or_else(|| "douyin".to_string(), sanitize_component)
            .chars()
            .take(MAX_NAME_CHARS)
            .collect();
        let path = self
            .output_dir
            .join(format!("{}{}.mp4", id.file_prefix(), stem.trim()));

        let result = tokio::select! {
            biased;

            () = cancel.cancelled() => Err(VideoError::Cancelled),

            r = self.stream_to_file(&media.media_url, &path, on_progress.as_ref()) => r,
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        info!(task_id = %id, path = %path.display(), "direct download finished");
        Ok(DirectOutcome {
            path,
            title: media.title,
        })
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_for(written: u64, total: Option<u64>, elapsed_secs: f64) -> ProgressSample {
    let rate = if elapsed_secs > 0.0 {
        written as f64 / elapsed_secs
    } else {
        0.0
    };
    let percent = total
        .filter(|t| *t > 0)
        .map_or(0.0, |t| (written as f64 / t as f64 * 100.0).min(100.0));
    let eta = match total {
        Some(t) if rate > 0.0 && t > written => {
            let secs = ((t - written) as f64 / rate) as u64;
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
        _ => String::new(),
    };
    ProgressSample {
        percent,
        speed: format!("{}/s", human_size(rate as u64)),
        eta,
        downloaded: Some(human_size(written)),
        total_size: total.map(human_size),
    }
}

#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}
