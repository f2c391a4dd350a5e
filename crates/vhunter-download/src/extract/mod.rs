//! Extraction client: URL → [`VideoDescriptor`] via `yt-dlp --dump-json`.

pub mod decoder;
pub mod diagnosis;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vhunter_core::{Settings, VideoDescriptor, VideoError};

use crate::hosts::{HostProfile, header_args};
use crate::process::{command_line, resolve_tool, run_captured};
pub use decoder::decode_descriptor;
pub use diagnosis::diagnose;

/// Runs the extraction tool in metadata-only mode.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    program: String,
    user_agent: String,
    mobile_user_agent: String,
    cookies_file: Option<String>,
    proxy: Option<String>,
}

impl ExtractionClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            program: settings.ytdlp.path.clone(),
            user_agent: settings.ytdlp.user_agent.clone(),
            mobile_user_agent: settings.douyin.mobile_user_agent.clone(),
            cookies_file: settings.ytdlp.cookies_file.clone(),
            proxy: settings.ytdlp.proxy.clone(),
        }
    }

    /// Arguments for a metadata dump of `url`.
    pub fn build_args(&self, url: &str) -> Vec<String> {
        let profile = HostProfile::classify(url);
        let user_agent = match profile {
            Some(p) if p.mobile_user_agent => &self.mobile_user_agent,
            _ => &self.user_agent,
        };
        let mut args: Vec<String> = vec![
            "--dump-json".into(),
            "--no-playlist".into(),
            "--user-agent".into(),
            user_agent.clone(),
            "--no-warnings".into(),
        ];
        if let Some(p) = profile {
            args.extend(header_args(p.headers.iter().copied()));
            for extractor_arg in p.extractor_args {
                args.push("--extractor-args".into());
                args.push((*extractor_arg).to_string());
            }
            if p.relax_certificates {
                args.push("--no-check-certificate".into());
            }
        }
        if let Some(cookies) = &self.cookies_file {
            args.extend(["--cookies".into(), cookies.clone()]);
        }
        if let Some(proxy) = &self.proxy {
            args.extend(["--proxy".into(), proxy.clone()]);
        }
        args.push(url.into());
        args
    }

    /// Fetch and decode metadata for `url`.
    ///
    /// A failing tool run yields [`VideoError::Unresolved`] whose descriptor
    /// carries the diagnosis; the message embeds the captured stderr.
    pub async fn fetch_descriptor(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<VideoDescriptor, VideoError> {
        let program = resolve_tool(&self.program)?;
        let args = self.build_args(url);
        let command = command_line(&program, &args);
        debug!(url = %url, command = %command, "running extraction");

        let output = run_captured(&program, &args, cancel).await?;

        if !output.success {
            let stderr = output.stderr.clone();
            let failure = output.into_failure(command);
            let message = failure.to_string();
            warn!(url = %url, error = %message, "extraction failed");
            return Err(VideoError::unresolved(
                message.clone(),
                diagnose(url, &stderr, &message),
            ));
        }

        let json = output.stdout.trim();
        if json.is_empty() {
            return Err(VideoError::EmptyOutput { command });
        }

        let descriptor = decode_descriptor(json)
            .map_err(|e| VideoError::parse("extraction output", e.to_string()))?;
        info!(url = %url, title = %descriptor.title, formats = descriptor.formats.len(), "extracted video info");
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_generic() {
        let client = ExtractionClient::new(&Settings::with_defaults());
        let args = client.build_args("https://example.com/v");
        assert_eq!(args[0], "--dump-json");
        assert_eq!(args[1], "--no-playlist");
        assert_eq!(args[3], vhunter_core::settings::DEFAULT_USER_AGENT);
        assert_eq!(args[4], "--no-warnings");
        assert_eq!(args.len(), 6);
    }

    #[test]
    fn test_build_args_host_profile() {
        let client = ExtractionClient::new(&Settings::with_defaults());
        let args = client.build_args("https://www.douyin.com/video/1");
        assert_eq!(args[3], vhunter_core::settings::DEFAULT_MOBILE_USER_AGENT);
        assert!(args.contains(&"--no-check-certificate".to_string()));
        assert!(args.contains(&"douyin:device_platform=android".to_string()));

        let spank = client.build_args("https://spankbang.com/x");
        assert!(!spank.iter().any(|a| a.starts_with("Sec-Fetch-User")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_and_empty_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let write_tool = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        };

        let mut settings = Settings::with_defaults();
        settings.ytdlp.path = write_tool("failing", "echo 'ERROR: Unsupported URL: x' >&2; exit 1");
        let err = ExtractionClient::new(&settings)
            .fetch_descriptor("https://example.com/x", &CancellationToken::new())
            .await
            .unwrap_err();
        let descriptor = err.descriptor().unwrap();
        assert!(descriptor.error_type.is_some());
        assert!(err.to_string().contains("Unsupported URL"));

        settings.ytdlp.path = write_tool("silent", "exit 0");
        let err = ExtractionClient::new(&settings)
            .fetch_descriptor("https://example.com/x", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::EmptyOutput { .. }));

        settings.ytdlp.path = write_tool("garbled", "echo '{oops'");
        let err = ExtractionClient::new(&settings)
            .fetch_descriptor("https://example.com/x", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::Parse { .. }));

        settings.ytdlp.path = write_tool("ok", r#"echo '{"title":"T","formats":[{"format_id":"1","ext":"mp4"}]}'"#);
        let d = ExtractionClient::new(&settings)
            .fetch_descriptor("https://example.com/x", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(d.title, "T");
    }
}
