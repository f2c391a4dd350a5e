//! Douyin URL classification and canonicalization.

use std::sync::LazyLock;

use regex::Regex;

static SHORT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://v\.douyin\.com/").expect("valid regex"));

static LONG_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://www\.douyin\.com/(?:share/)?video/").expect("valid regex")
});

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"douyin\.com/(?:share/)?video/(\d+)").expect("valid regex")
});

/// Whether the direct resolver applies to this URL.
pub fn is_douyin_url(url: &str) -> bool {
    SHORT_LINK.is_match(url) || LONG_LINK.is_match(url)
}

/// `v.douyin.com/<code>` share links.
pub fn is_short_link(url: &str) -> bool {
    SHORT_LINK.is_match(url)
}

/// Numeric video id embedded in a long link.
pub fn video_id(url: &str) -> Option<String> {
    VIDEO_ID.captures(url).map(|c| c[1].to_string())
}

/// Normalize a long link to `https://www.douyin.com/video/<id>`.
///
/// Short links and anything unrecognized are returned unchanged.
pub fn canonicalize(url: &str) -> String {
    if is_short_link(url) {
        return url.to_string();
    }
    video_id(url).map_or_else(
        || url.to_string(),
        |id| format!("https://www.douyin.com/video/{id}"),
    )
}

/// Swap the watermarked stream marker for the clean variant.
pub fn strip_watermark(url: &str) -> String {
    url.replacen("playwm", "play", 1)
}
