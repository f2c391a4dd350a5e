//! Normalized video metadata and the remediation catalogue.
//!
//! A [`VideoDescriptor`] is what every metadata path produces, whether the
//! information came from the extraction tool, a platform API, or a failure
//! diagnosis. Failures that map to a known [`FailureCategory`] carry a note
//! and a list of suggestions so callers can render something useful.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One downloadable rendition of a video.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub format_id: String,
    /// Container extension (`mp4`, `webm`, ...).
    #[serde(rename = "extension", alias = "ext")]
    pub ext: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resolution: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    /// Direct media URL, when the source exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Format {
    /// The catch-all `best`/`mp4` placeholder format.
    #[must_use]
    pub fn best_mp4() -> Self {
        Self {
            format_id: "best".to_string(),
            ext: "mp4".to_string(),
            resolution: "best".to_string(),
            ..Self::default()
        }
    }
}

/// Known failure classes with a canned remediation list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Douyin page that needs login or rejected the extractor.
    DouyinAccess,
    /// Douyin short link that no strategy could expand.
    DouyinShortLink,
    /// Bilibili page that needs login or a different quality.
    BilibiliAccess,
    /// Anything else.
    GeneralError,
}

impl FailureCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DouyinAccess => "douyin_access",
            Self::DouyinShortLink => "douyin_short_link",
            Self::BilibiliAccess => "bilibili_access",
            Self::GeneralError => "general_error",
        }
    }

    /// Display title used when the real title is unknown.
    #[must_use]
    pub const fn fallback_title(&self) -> &'static str {
        match self {
            Self::DouyinAccess | Self::DouyinShortLink => "Douyin video",
            Self::BilibiliAccess => "Bilibili video",
            Self::GeneralError => "Video information unavailable",
        }
    }

    /// Headline shown above the remediation list.
    #[must_use]
    pub const fn note(&self) -> &'static str {
        match self {
            Self::DouyinAccess => "Douyin requires login information. Try the following:",
            Self::DouyinShortLink => "The Douyin short link could not be resolved. Try the following:",
            Self::BilibiliAccess => "Bilibili may require login information. Try the following:",
            Self::GeneralError => "Could not fetch video information. Try the following:",
        }
    }

    /// Suggested remediations, in display order.
    #[must_use]
    pub fn remediations(&self) -> Vec<String> {
        let items: &[&str] = match self {
            Self::DouyinAccess => &[
                "Use a link shared from the mobile app (short links start with v.douyin.com)",
                "Make sure the link is well formed, e.g. https://v.douyin.com/xxxxxx/",
                "Get a fresh link through the official share button",
                "Copy the link from inside the Douyin app",
            ],
            Self::DouyinShortLink => &[
                "Use the full video link (starting with www.douyin.com/video/)",
                "Make sure the short link is complete and still valid",
                "Get a fresh link through the official share button",
                "Use the copy-link action inside the Douyin app",
            ],
            Self::BilibiliAccess => &[
                "Make sure the link is well formed",
                "Get a fresh link through the official share button",
                "Try a different video quality",
            ],
            Self::GeneralError => &[
                "Check the network connection",
                "Make sure the link is well formed",
                "Try another video source",
                "The link may have expired; get a fresh one",
            ],
        };
        items.iter().map(|s| (*s).to_string()).collect()
    }
}

/// Normalized metadata about a video, independent of how it was obtained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub duration: String,
    #[serde(default)]
    pub formats: Vec<Format>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub special_note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<FailureCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solutions: Vec<String>,
    pub can_download: bool,
}

impl VideoDescriptor {
    /// A remediation-bearing descriptor for a failed resolution.
    ///
    /// The original error text is kept under `metadata.original_error`.
    #[must_use]
    pub fn unresolved(category: FailureCategory, original_error: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("original_error".to_string(), original_error.into());
        Self {
            title: category.fallback_title().to_string(),
            formats: vec![Format::best_mp4()],
            metadata,
            special_note: category.note().to_string(),
            error_type: Some(category),
            solutions: category.remediations(),
            can_download: false,
            ..Self::default()
        }
    }

    /// Replace the headline note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.special_note = note.into();
        self
    }

    /// Append a remediation unless already present.
    pub fn push_solution(&mut self, solution: impl Into<String>) {
        let solution = solution.into();
        if !self.solutions.contains(&solution) {
            self.solutions.push(solution);
        }
    }
}
