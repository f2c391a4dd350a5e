//! File-name classification for downloaded artifacts.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// OS housekeeping files that are never artifacts.
const NOISE_FILES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitignore"];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "flv"];
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "aac", "mp3", "opus"];

/// yt-dlp per-format suffix, e.g. `.f137.mp4` or `.fhls-720p.mp4`.
static FORMAT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.f(?:\d|hls-|dash-|http-)[\w-]*(\.\w+)$").expect("valid regex")
});

/// Broad media class of a file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Other,
}

/// Whether a directory entry should be ignored entirely.
pub fn is_noise(name: &str) -> bool {
    NOISE_FILES.contains(&name) || name.starts_with('.')
}

pub fn media_kind(path: &Path) -> MediaKind {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return MediaKind::Other;
    };
    let ext = ext.to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Audio
    } else {
        MediaKind::Other
    }
}

/// Whether the name carries a per-format marker (a single stream of a split download).
pub fn has_format_marker(name: &str) -> bool {
    FORMAT_MARKER.is_match(name)
}

/// Remove the per-format marker, keeping the extension.
pub fn strip_format_marker(name: &str) -> String {
    FORMAT_MARKER.replace(name, "$1").into_owned()
}

/// Download name shown to users: no task prefix, no format marker, no `_merged`.
pub fn friendly_filename(name: &str, task_prefix: &str) -> String {
    let unprefixed = name.strip_prefix(task_prefix).unwrap_or(name);
    let unmarked = strip_format_marker(unprefixed);
    let cleaned = unmarked.replacen("_merged", "", 1);
    let stem_empty = Path::new(&cleaned)
        .file_stem()
        .is_none_or(|s| s.is_empty() || s.to_string_lossy().starts_with('.'));
    if stem_empty {
        let ext = Path::new(&cleaned)
            .extension()
            .map_or_else(|| "mp4".to_string(), |e| e.to_string_lossy().into_owned());
        return format!("video.{ext}");
    }
    cleaned
}

/// Make a string safe as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}
