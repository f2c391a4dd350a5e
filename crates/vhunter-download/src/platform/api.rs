//! Douyin JSON endpoints: request shaping and typed response decoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

pub(crate) const MOBILE_APP_USER_AGENT: &str = "com.ss.android.ugc.aweme/800 (Linux; U; Android 10; zh_CN; Pixel 4; Build/QQ3A.200805.001; Cronet/58.0.2991.0)";

const WEB_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub(crate) const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
pub(crate) const DOUYIN_REFERER: &str = "https://www.douyin.com/";

/// The three first-party endpoints, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Public share-page item info.
    ItemInfo,
    /// Web client detail API.
    WebDetail,
    /// Android app detail API with signed headers.
    MobileDetail,
}

impl Endpoint {
    pub const ORDER: [Self; 3] = [Self::ItemInfo, Self::WebDetail, Self::MobileDetail];

    pub const fn name(self) -> &'static str {
        match self {
            Self::ItemInfo => "iteminfo",
            Self::WebDetail => "web_detail",
            Self::MobileDetail => "mobile_detail",
        }
    }

    pub fn url(self, video_id: &str) -> String {
        match self {
            Self::ItemInfo => format!(
                "https://www.iesdouyin.com/web/api/v2/aweme/iteminfo/?item_ids={video_id}"
            ),
            Self::WebDetail => format!(
                "https://www.douyin.com/aweme/v1/web/aweme/detail/?aweme_id={video_id}&aid=1128&version_name=23.5.0&device_platform=web"
            ),
            Self::MobileDetail => {
                format!("https://aweme.snssdk.com/aweme/v1/aweme/detail/?aweme_id={video_id}")
            }
        }
    }

    /// Request headers for this endpoint.
    pub fn headers(self, video_id: &str, mobile_user_agent: &str) -> Vec<(&'static str, String)> {
        match self {
            Self::ItemInfo => vec![
                ("User-Agent", mobile_user_agent.to_string()),
                ("Accept", "application/json, text/plain, */*".to_string()),
                ("Referer", DOUYIN_REFERER.to_string()),
                ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
            ],
            Self::WebDetail => vec![
                ("User-Agent", WEB_USER_AGENT.to_string()),
                ("Accept", "application/json, text/plain, */*".to_string()),
                ("Referer", format!("https://www.douyin.com/video/{video_id}")),
                ("Accept-Language", ACCEPT_LANGUAGE.to_string()),
                ("Origin", "https://www.douyin.com".to_string()),
                ("Sec-Fetch-Site", "same-origin".to_string()),
                ("Sec-Fetch-Mode", "cors".to_string()),
                ("Sec-Fetch-Dest", "empty".to_string()),
            ],
            Self::MobileDetail => {
                let (khronos, gorgon) = signature_now();
                vec![
                    ("User-Agent", MOBILE_APP_USER_AGENT.to_string()),
                    ("Accept", "application/json".to_string()),
                    ("Accept-Language", "zh-CN,zh;q=0.9".to_string()),
                    ("X-Khronos", khronos),
                    ("X-Gorgon", gorgon),
                ]
            }
        }
    }

    /// Decode a response body into candidate media URLs and a title.
    pub fn decode(self, body: &str) -> Result<ApiVideo, String> {
        match self {
            Self::ItemInfo => {
                let parsed: ItemInfoResponse =
                    serde_json::from_str(body).map_err(|e| e.to_string())?;
                if parsed.status_code != 0 {
                    return Err(format!("status_code {}", parsed.status_code));
                }
                let aweme = parsed
                    .item_list
                    .into_iter()
                    .next()
                    .ok_or_else(|| "empty item_list".to_string())?;
                Ok(aweme.into_video(true))
            }
            Self::WebDetail | Self::MobileDetail => {
                let parsed: DetailResponse =
                    serde_json::from_str(body).map_err(|e| e.to_string())?;
                let aweme = parsed
                    .aweme_detail
                    .ok_or_else(|| "missing aweme_detail".to_string())?;
                Ok(aweme.into_video(self == Self::WebDetail))
            }
        }
    }
}

/// Media candidates extracted from one API answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiVideo {
    pub title: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ItemInfoResponse {
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    item_list: Vec<Aweme>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    aweme_detail: Option<Aweme>,
}

#[derive(Debug, Deserialize)]
struct Aweme {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    video: Option<AwemeVideo>,
}

#[derive(Debug, Deserialize)]
struct AwemeVideo {
    #[serde(default)]
    play_addr: Option<UrlList>,
}

#[derive(Debug, Deserialize)]
struct UrlList {
    #[serde(default)]
    url_list: Vec<String>,
}

impl Aweme {
    fn into_video(self, strip_watermark: bool) -> ApiVideo {
        let candidates = self
            .video
            .and_then(|v| v.play_addr)
            .map(|p| p.url_list)
            .unwrap_or_default()
            .into_iter()
            .filter(|u| !u.is_empty())
            .map(|u| {
                if strip_watermark {
                    super::urls::strip_watermark(&u)
                } else {
                    u
                }
            })
            .collect();
        ApiVideo {
            title: self.desc,
            candidates,
        }
    }
}

/// `X-Khronos` / `X-Gorgon` pair for the app API.
pub(crate) fn signature(unix_secs: u64, subsec_nanos: u32) -> (String, String) {
    (unix_secs.to_string(), format!("8404e4a20000{subsec_nanos:08x}"))
}

fn signature_now() -> (String, String) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    signature(now.as_secs(), now.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteminfo_decoding_strips_watermark() {
        let body = r#"{"status_code":0,"item_list":[{"desc":"sunset","video":{"play_addr":{"url_list":["https://aweme.test/playwm/?video_id=1","https://b.test/play/"]}}}]}"#;
        let video = Endpoint::ItemInfo.decode(body).unwrap();
        assert_eq!(video.title, "sunset");
        assert_eq!(
            video.candidates,
            ["https://aweme.test/play/?video_id=1", "https://b.test/play/"]
        );
    }

    #[test]
    fn test_iteminfo_rejects_status() {
        let err = Endpoint::ItemInfo
            .decode(r#"{"status_code":8,"item_list":[]}"#)
            .unwrap_err();
        assert!(err.contains('8'));
        assert!(Endpoint::ItemInfo.decode(r#"{"status_code":0}"#).is_err());
    }

    #[test]
    fn test_mobile_detail_keeps_urls_verbatim() {
        let body = r#"{"aweme_detail":{"desc":"x","video":{"play_addr":{"url_list":["https://a.test/playwm/"]}}}}"#;
        let video = Endpoint::MobileDetail.decode(body).unwrap();
        assert_eq!(video.candidates, ["https://a.test/playwm/"]);
        let web = Endpoint::WebDetail.decode(body).unwrap();
        assert_eq!(web.candidates, ["https://a.test/play/"]);
        assert!(Endpoint::WebDetail.decode("{}").is_err());
    }

    #[test]
    fn test_signature_format() {
        let (khronos, gorgon) = signature(1_700_000_000, 0xabc);
        assert_eq!(khronos, "1700000000");
        assert_eq!(gorgon, "8404e4a2000000000abc");
    }

    #[test]
    fn test_endpoint_urls_embed_id() {
        for endpoint in Endpoint::ORDER {
            assert!(endpoint.url("123").contains("123"));
        }
        let headers = Endpoint::WebDetail.headers("42", "ua");
        assert!(headers
            .iter()
            .any(|(k, v)| *k == "Referer" && v == "https://www.douyin.com/video/42"));
    }
}
