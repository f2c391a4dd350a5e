//! Page fetch through curl and HTML pattern extraction.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vhunter_core::VideoError;

use super::api::{ACCEPT_LANGUAGE, DOUYIN_REFERER};
use crate::process::run_captured;

/// Retry UA when the first fetch fails.
pub(crate) const IPHONE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

const MAX_TITLE_CHARS: usize = 100;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""aweme_id"\s*:\s*"(\d+)""#,
        r#""itemId"\s*:\s*"(\d+)""#,
        r#""video_id"\s*:\s*"(\d+)""#,
        r"/video/(\d+)",
        r#""id"\s*:\s*"(\d+)""#,
        r#""awemeId"\s*:\s*"(\d+)""#,
        r#""aweme":\{"id":"(\d+)""#,
        r#"data-id="(\d+)""#,
        r#"videoId\s*:\s*['"](\d+)['"]"#,
        r"/share/video/(\d+)",
        r#""id":\s*(\d+)"#,
    ])
});

static MEDIA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""playAddr":\s*\[\s*"([^"]+)""#,
        r#""play_addr":\s*\{\s*"url_list":\s*\[\s*"([^"]+)""#,
        r#""url":"([^"]+\.mp4[^"]*)""#,
        r#"src="([^"]+\.mp4[^"]*)""#,
        r#""downloadAddr":\s*\[\s*"([^"]+)""#,
        r#""download_addr":\s*\{\s*"url_list":\s*\[\s*"([^"]+)""#,
        r#""video":\s*\{\s*"play_addr":\s*\{\s*"url_list":\s*\[\s*"([^"]+)""#,
        r#""playApi":\s*"([^"]+)""#,
        r#""videoUrl":\s*"([^"]+)""#,
        r#""video_url":\s*"([^"]+)""#,
        r#""playUrl":\s*"([^"]+)""#,
        r#""play_url":\s*"([^"]+)""#,
        r#"<video[^>]+src="([^"]+)""#,
        r#"<source[^>]+src="([^"]+)""#,
    ])
});

static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"<title>([^<]+)</title>",
        r#""desc":"([^"]+)""#,
        r#""title":"([^"]+)""#,
        r#""description":"([^"]+)""#,
        r#"<meta\s+name="description"\s+content="([^"]+)""#,
        r#"<meta\s+property="og:title"\s+content="([^"]+)""#,
        r#"<meta\s+property="og:description"\s+content="([^"]+)""#,
        r"<h1[^>]*>([^<]+)</h1>",
        r#""text":"([^"]+)""#,
        r#""content":"([^"]+)""#,
        r#""videoTitle":"([^"]+)""#,
        r#""video_title":"([^"]+)""#,
    ])
});

fn first_capture<'h>(patterns: &[Regex], haystack: &'h str) -> Option<&'h str> {
    patterns
        .iter()
        .find_map(|re| re.captures(haystack).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
}

fn unescape_json_slashes(raw: &str) -> String {
    raw.replace("\\u002F", "/").replace("\\/", "/")
}

/// Numeric video id embedded anywhere in the page.
pub(crate) fn extract_video_id(html: &str) -> Option<String> {
    first_capture(&ID_PATTERNS, html).map(str::to_string)
}

/// First media URL found in the page, unescaped.
pub(crate) fn extract_media_url(html: &str) -> Option<String> {
    let raw = unescape_json_slashes(first_capture(&MEDIA_PATTERNS, html)?);
    let decoded = urlencoding::decode(&raw).map_or(raw.clone(), |d| d.into_owned());
    Some(decoded)
}

/// Page title, trimmed and capped at 100 characters.
pub(crate) fn extract_title(html: &str) -> Option<String> {
    let raw = first_capture(&TITLE_PATTERNS, html)?;
    let title = unescape_json_slashes(raw).trim().to_string();
    if title.is_empty() {
        return None;
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        let cut: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        return Some(format!("{cut}..."));
    }
    Some(title)
}

/// curl arguments for a browser-like page fetch into `output`.
pub(crate) fn curl_args(url: &str, user_agent: &str, timeout: Duration, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-s".into(), "-L".into(), "-A".into(), user_agent.into()];
    for header in [
        "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_string(),
        format!("Accept-Language: {ACCEPT_LANGUAGE}"),
        "Connection: keep-alive".to_string(),
        "Upgrade-Insecure-Requests: 1".to_string(),
        "Sec-Fetch-Mode: navigate".to_string(),
        "Sec-Fetch-Site: none".to_string(),
        "Sec-Fetch-Dest: document".to_string(),
        "DNT: 1".to_string(),
        format!("Referer: {DOUYIN_REFERER}"),
    ] {
        args.push("-H".into());
        args.push(header);
    }
    args.push("--max-time".into());
    args.push(timeout.as_secs().max(1).to_string());
    args.push("-o".into());
    args.push(output.display().to_string());
    args.push(url.into());
    args
}

/// Fetch a page body, retrying once with the iPhone UA.
pub(crate) async fn fetch_page(
    curl: &Path,
    url: &str,
    user_agent: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String, VideoError> {
    let mut last_err = VideoError::network("page fetch did not run");
    for ua in [user_agent, IPHONE_USER_AGENT] {
        match fetch_once(curl, url, ua, timeout, cancel).await {
            Ok(body) => return Ok(body),
            Err(VideoError::Cancelled) => return Err(VideoError::Cancelled),
            Err(e) => {
                debug!(url = %url, error = %e, "page fetch failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

async fn fetch_once(
    curl: &Path,
    url: &str,
    user_agent: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String, VideoError> {
    let body_file = tempfile::NamedTempFile::new()
        .map_err(|e| VideoError::io_context("create scrape temp file", &e))?;
    let args = curl_args(url, user_agent, timeout, body_file.path());
    let output = run_captured(curl, &args, cancel).await?;
    if !output.success {
        return Err(output.into_failure(crate::process::command_line(curl, &args)));
    }
    let bytes = tokio::fs::read(body_file.path())
        .await
        .map_err(|e| VideoError::io_context("read scraped page", &e))?;
    if bytes.is_empty() {
        return Err(VideoError::EmptyOutput {
            command: "curl".to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_prefers_aweme_id() {
        let html = r#"<a href="/video/111"></a><script>{"aweme_id":"7300000000000000001"}</script>"#;
        assert_eq!(extract_video_id(html).as_deref(), Some("7300000000000000001"));
        assert_eq!(extract_video_id("<a href='/video/42'>").as_deref(), Some("42"));
        assert!(extract_video_id("<html></html>").is_none());
    }

    #[test]
    fn test_extract_media_url_unescapes() {
        let html = r#"{"playAddr":["https://v.test/play%3Fid%3D1"]}"#;
        assert_eq!(extract_media_url(html).as_deref(), Some("https://v.test/play?id=1"));
        let tag = r#"<video class="x" src="https://cdn.test/a.mp4?x=1"></video>"#;
        assert_eq!(extract_media_url(tag).as_deref(), Some("https://cdn.test/a.mp4?x=1"));
    }

    #[test]
    fn test_extract_title_truncates() {
        assert_eq!(
            extract_title("<title>  Night market  </title>").as_deref(),
            Some("Night market")
        );
        let long = format!("<title>{}</title>", "字".repeat(150));
        let title = extract_title(&long).unwrap();
        assert_eq!(title.chars().count(), 100);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_curl_args_shape() {
        let args = curl_args(
            "https://v.douyin.com/abc/",
            "UA",
            Duration::from_secs(10),
            Path::new("/tmp/page.html"),
        );
        assert_eq!(&args[..4], ["-s", "-L", "-A", "UA"]);
        assert!(args.contains(&"Referer: https://www.douyin.com/".to_string()));
        let tail: Vec<&str> = args[args.len() - 5..].iter().map(String::as_str).collect();
        assert_eq!(tail, ["--max-time", "10", "-o", "/tmp/page.html", "https://v.douyin.com/abc/"]);
    }
}
