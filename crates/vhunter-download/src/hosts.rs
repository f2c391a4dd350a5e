//! Per-host request shaping.
//!
//! A small registry maps a URL classifier to a [`HostProfile`] carrying the
//! headers, extra tool flags and certificate policy that host needs. Both the
//! extraction client and the transfer argument builder read from here.

use vhunter_core::FailureCategory;

/// How the transfer should pick formats for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPolicy {
    /// Pass the request's selector through untouched.
    AsRequested,
    /// Prefer a combined stream, then separate video+audio, force an mp4
    /// container and point the tool at ffmpeg when it is installed.
    PreferMerged,
}

/// Request shaping for one known host.
#[derive(Debug)]
pub struct HostProfile {
    pub name: &'static str,
    needles: &'static [&'static str],
    /// Headers sent on both metadata extraction and transfer.
    pub headers: &'static [(&'static str, &'static str)],
    /// Additional headers sent only on transfer.
    pub transfer_headers: &'static [(&'static str, &'static str)],
    /// `--extractor-args` values.
    pub extractor_args: &'static [&'static str],
    /// Add `--no-check-certificate`.
    pub relax_certificates: bool,
    /// Use the mobile UA instead of the desktop one.
    pub mobile_user_agent: bool,
    /// Referer used on transfer when the request has none.
    pub default_referer: Option<&'static str>,
    pub format_policy: FormatPolicy,
    /// Category used when diagnosing an extraction failure.
    pub failure_category: FailureCategory,
}

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

const CHINESE_BROWSER_HEADERS: &[(&str, &str)] = &[
    ("Accept", BROWSER_ACCEPT),
    ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
    ("Accept-Encoding", "gzip, deflate, br"),
    ("DNT", "1"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
];

static PROFILES: &[HostProfile] = &[
    HostProfile {
        name: "spankbang",
        needles: &["spankbang.com"],
        headers: &[
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Accept-Encoding", "gzip, deflate"),
            ("DNT", "1"),
            ("Connection", "keep-alive"),
            ("Upgrade-Insecure-Requests", "1"),
        ],
        transfer_headers: &[
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
            ("Cache-Control", "max-age=0"),
        ],
        extractor_args: &[],
        relax_certificates: false,
        mobile_user_agent: false,
        default_referer: Some("https://spankbang.com/"),
        format_policy: FormatPolicy::AsRequested,
        failure_category: FailureCategory::GeneralError,
    },
    HostProfile {
        name: "bilibili",
        needles: &["bilibili.com"],
        headers: CHINESE_BROWSER_HEADERS,
        transfer_headers: &[],
        extractor_args: &[],
        relax_certificates: true,
        mobile_user_agent: false,
        default_referer: None,
        format_policy: FormatPolicy::PreferMerged,
        failure_category: FailureCategory::BilibiliAccess,
    },
    HostProfile {
        name: "douyin",
        needles: &["douyin.com"],
        headers: CHINESE_BROWSER_HEADERS,
        transfer_headers: &[],
        extractor_args: &["douyin:app_version=9.9.10", "douyin:device_platform=android"],
        relax_certificates: true,
        mobile_user_agent: true,
        default_referer: None,
        format_policy: FormatPolicy::AsRequested,
        failure_category: FailureCategory::DouyinAccess,
    },
    HostProfile {
        name: "pinterest",
        needles: &["pinterest.com"],
        headers: &[
            ("Accept", BROWSER_ACCEPT),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("DNT", "1"),
            ("Connection", "keep-alive"),
            ("Upgrade-Insecure-Requests", "1"),
        ],
        transfer_headers: &[],
        extractor_args: &[],
        relax_certificates: false,
        mobile_user_agent: false,
        default_referer: None,
        format_policy: FormatPolicy::AsRequested,
        failure_category: FailureCategory::GeneralError,
    },
];

impl HostProfile {
    /// Find the profile whose classifier matches `url`.
    pub fn classify(url: &str) -> Option<&'static Self> {
        PROFILES.iter().find(|p| p.matches(url))
    }

    /// Whether this profile applies to `url`.
    pub fn matches(&self, url: &str) -> bool {
        self.needles.iter().any(|n| url.contains(n))
    }
}

/// `--add-header` pairs for a header list, in `Key: Value` form.
pub(crate) fn header_args<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .flat_map(|(k, v)| ["--add-header".to_string(), format!("{k}: {v}")])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_hosts() {
        let cases = [
            ("https://spankbang.com/abc/video/x", "spankbang"),
            ("https://www.bilibili.com/video/BV1xx", "bilibili"),
            ("https://v.douyin.com/AbCdEf/", "douyin"),
            ("https://www.douyin.com/video/7300000000000000000", "douyin"),
            ("https://www.pinterest.com/pin/123/", "pinterest"),
        ];
        for (url, expected) in cases {
            assert_eq!(HostProfile::classify(url).map(|p| p.name), Some(expected), "{url}");
        }
        assert!(HostProfile::classify("https://example.com/x").is_none());
    }

    #[test]
    fn test_profiles_are_distinct() {
        let douyin = HostProfile::classify("https://v.douyin.com/x").unwrap();
        assert!(douyin.mobile_user_agent);
        assert!(douyin.relax_certificates);
        assert_eq!(douyin.extractor_args.len(), 2);

        let bilibili = HostProfile::classify("https://bilibili.com/video/x").unwrap();
        assert_eq!(bilibili.format_policy, FormatPolicy::PreferMerged);
        assert_eq!(bilibili.failure_category, FailureCategory::BilibiliAccess);

        let spankbang = HostProfile::classify("https://spankbang.com/x").unwrap();
        assert_eq!(spankbang.default_referer, Some("https://spankbang.com/"));
        assert!(!spankbang.transfer_headers.is_empty());
    }

    #[test]
    fn test_header_args_format() {
        let args = header_args([("DNT", "1"), ("Accept", "*/*")]);
        assert_eq!(args, ["--add-header", "DNT: 1", "--add-header", "Accept: */*"]);
    }
}
