//! Argument construction for the transfer tool.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use vhunter_core::{DownloadRequest, TaskId};

use crate::artifact::classify::sanitize_component;
use crate::hosts::{FormatPolicy, HostProfile, header_args};

/// Flags every run gets; line-oriented verbose output is what the parser reads.
const BASE_FLAGS_AFTER_UA: &[&str] = &["--no-warnings", "-v", "--newline"];

const MERGED_FALLBACK_FORMAT: &str = "bestvideo+bestaudio/best";

/// Options that would let a caller run commands or write outside the output directory.
const DENIED_OPTIONS: &[&str] = &[
    "exec",
    "exec-before-download",
    "output",
    "paths",
    "config-locations",
    "batch-file",
    "load-info-json",
];

static OPTION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("valid regex"));

/// Run-independent inputs to argument building.
#[derive(Debug, Clone)]
pub struct ArgsContext {
    pub user_agent: String,
    pub mobile_user_agent: String,
    /// `--ffmpeg-location` value when ffmpeg was found.
    pub ffmpeg_location: Option<String>,
    /// Cookies file used when the request has none.
    pub cookies_file: Option<String>,
    pub proxy: Option<String>,
}

/// Output template: every artifact name starts with `<id>_`.
pub fn output_template(output_dir: &Path, id: &TaskId, requested: Option<&Path>) -> PathBuf {
    let name = requested
        .and_then(Path::file_name)
        .map(|n| sanitize_component(&n.to_string_lossy()))
        .unwrap_or_else(|| "%(title)s.%(ext)s".to_string());
    output_dir.join(format!("{}{name}", id.file_prefix()))
}

/// Full argument vector for one transfer.
pub fn build_transfer_args(
    request: &DownloadRequest,
    template: &Path,
    ctx: &ArgsContext,
) -> Vec<String> {
    let profile = HostProfile::classify(&request.url);
    let user_agent = match profile {
        Some(p) if p.mobile_user_agent => &ctx.mobile_user_agent,
        _ => &ctx.user_agent,
    };

    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--user-agent".into(),
        user_agent.clone(),
    ];
    args.extend(BASE_FLAGS_AFTER_UA.iter().map(|s| (*s).to_string()));

    let mut format_handled = false;
    if let Some(p) = profile {
        args.extend(header_args(
            p.headers.iter().chain(p.transfer_headers).copied(),
        ));
        for extractor_arg in p.extractor_args {
            args.push("--extractor-args".into());
            args.push((*extractor_arg).to_string());
        }
        if p.format_policy == FormatPolicy::PreferMerged {
            let selector = request.format.as_deref().map_or_else(
                || MERGED_FALLBACK_FORMAT.to_string(),
                |f| format!("{f}/{MERGED_FALLBACK_FORMAT}"),
            );
            args.extend(["-f".into(), selector, "--merge-output-format".into(), "mp4".into()]);
            if let Some(ffmpeg) = &ctx.ffmpeg_location {
                args.extend(["--ffmpeg-location".into(), ffmpeg.clone()]);
            }
            format_handled = true;
        }
        if p.relax_certificates {
            args.push("--no-check-certificate".into());
        }
    }

    args.extend(header_args(
        request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    ));

    if let Some(cookies) = request.cookies.as_ref().or(ctx.cookies_file.as_ref()) {
        args.extend(["--cookies".into(), cookies.clone()]);
    }

    let referer = request
        .referer
        .clone()
        .or_else(|| profile.and_then(|p| p.default_referer).map(str::to_string));
    if let Some(referer) = referer {
        args.extend(["--referer".into(), referer]);
    }

    if !format_handled {
        if let Some(format) = &request.format {
            args.extend(["-f".into(), format.clone()]);
        }
    }

    if let Some(proxy) = &ctx.proxy {
        args.extend(["--proxy".into(), proxy.clone()]);
    }

    for (key, value) in &request.options {
        let key = key.trim_start_matches('-');
        if !OPTION_KEY.is_match(key) || DENIED_OPTIONS.contains(&key) {
            warn!(option = %key, "dropping disallowed downloader option");
            continue;
        }
        args.push(format!("--{key}"));
        if !value.is_empty() {
            args.push(value.clone());
        }
    }

    args.push("-o".into());
    args.push(template.display().to_string());
    args.push(request.url.clone());
    args
}
