//! Turns an extraction failure into a remediation-bearing descriptor.

use vhunter_core::{FailureCategory, VideoDescriptor};

use crate::hosts::HostProfile;

const LOGIN_NOTE: &str = "This video requires login information. Try the following:";
const URL_FORMAT_NOTE: &str = "The link format is not recognized. Try the following:";

/// Category for a failed URL, from its host profile.
pub fn category_for(url: &str) -> FailureCategory {
    HostProfile::classify(url).map_or(FailureCategory::GeneralError, |p| p.failure_category)
}

/// Descriptor explaining why extraction of `url` failed.
///
/// `error_text` is kept verbatim under `metadata.original_error`.
pub fn diagnose(url: &str, stderr: &str, error_text: &str) -> VideoDescriptor {
    let category = category_for(url);
    let mut descriptor = VideoDescriptor::unresolved(category, error_text);

    if stderr.contains("cookies") {
        descriptor = descriptor.with_note(LOGIN_NOTE);
        descriptor.push_solution("Export your browser cookies to a file and pass it as `cookies`");
    }

    if stderr.contains("Unsupported URL") {
        descriptor = descriptor.with_note(URL_FORMAT_NOTE);
        descriptor.push_solution("Make sure the link is complete");
        if matches!(
            category,
            FailureCategory::DouyinAccess | FailureCategory::DouyinShortLink
        ) {
            descriptor.push_solution("Use the short link form https://v.douyin.com/xxxxxx/");
        }
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_by_host() {
        assert_eq!(category_for("https://www.bilibili.com/video/x"), FailureCategory::BilibiliAccess);
        assert_eq!(category_for("https://www.douyin.com/video/1"), FailureCategory::DouyinAccess);
        assert_eq!(category_for("https://example.com"), FailureCategory::GeneralError);
    }

    #[test]
    fn test_cookie_refinement() {
        let d = diagnose(
            "https://www.bilibili.com/video/x",
            "ERROR: use --cookies-from-browser or --cookies",
            "Command failed",
        );
        assert_eq!(d.special_note, LOGIN_NOTE);
        assert_eq!(d.solutions.len(), 4);
        assert_eq!(d.metadata["original_error"], "Command failed");
        assert!(!d.can_download);
    }

    #[test]
    fn test_unsupported_url_refinement() {
        let d = diagnose("https://www.douyin.com/video/1", "ERROR: Unsupported URL: x", "e");
        assert_eq!(d.special_note, URL_FORMAT_NOTE);
        assert!(d.solutions.iter().any(|s| s.contains("v.douyin.com/xxxxxx")));

        let generic = diagnose("https://example.com/x", "ERROR: Unsupported URL: x", "e");
        assert!(!generic.solutions.iter().any(|s| s.contains("v.douyin.com/xxxxxx")));
    }

    #[test]
    fn test_plain_failure_keeps_category_note() {
        let d = diagnose("https://example.com/x", "ERROR: 404", "e");
        assert_eq!(d.special_note, FailureCategory::GeneralError.note());
        assert_eq!(d.solutions, FailureCategory::GeneralError.remediations());
    }
}
