//! Third-party relay parsers.
//!
//! Relays answer with loosely shaped JSON (or sometimes a bare URL). The
//! payload is walked with `serde_json::Value` here and nowhere else.

use serde_json::Value;

/// Relay endpoints; the page URL is appended query-escaped.
pub(crate) const RELAYS: &[&str] = &[
    "https://api.douyin.wtf/api?url=",
    "https://api.scxs.cn/?url=",
    "https://api.oick.cn/douyin/api.php?url=",
    "https://api.3jx.top/api/douyin.php?url=",
    "https://tenapi.cn/v2/video?url=",
    "https://api.douyin.qlike.cn/api.php?url=",
    "https://api.lyfzn.com/douyin/api/?url=",
    "https://api.douyin.city/api?url=",
    "https://api.kit9.cn/api/douyin_parse/api.php?url=",
    "https://api.tikhub.io/douyin/?url=",
];

const URL_KEYS: &[&str] = &["url", "video_url", "play_url", "video", "nwm_video_url", "mp4"];
const TITLE_KEYS: &[&str] = &["title", "desc", "text"];

/// Full request URL for one relay.
pub(crate) fn relay_url(base: &str, page_url: &str) -> String {
    format!("{base}{}", urlencoding::encode(page_url))
}

/// What a relay answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RelayAnswer {
    pub media_url: String,
    pub title: Option<String>,
}

/// Extract a media URL (and maybe a title) from a relay response body.
pub(crate) fn parse_relay_body(body: &str) -> Result<RelayAnswer, String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err("empty response".to_string());
    }

    let Ok(root) = serde_json::from_str::<Value>(trimmed) else {
        if trimmed.starts_with("http") {
            return Ok(RelayAnswer {
                media_url: trimmed.to_string(),
                title: None,
            });
        }
        return Err("response is neither JSON nor a URL".to_string());
    };

    if let Some(code) = root.get("code").and_then(Value::as_i64) {
        if code != 200 && code != 0 {
            let msg = root
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(format!("code {code}: {msg}"));
        }
    }

    let scopes: Vec<&Value> = root.get("data").into_iter().chain([&root]).collect();

    let media_url = scopes
        .iter()
        .find_map(|scope| first_string(scope, URL_KEYS))
        .or_else(|| any_media_string(&root));

    let Some(media_url) = media_url else {
        return Err("no media URL in response".to_string());
    };

    let title = scopes.iter().find_map(|scope| first_string(scope, TITLE_KEYS));

    Ok(RelayAnswer { media_url, title })
}

fn first_string(scope: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| scope.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn any_media_string(root: &Value) -> Option<String> {
    root.as_object()?
        .values()
        .filter_map(Value::as_str)
        .find(|s| s.starts_with("http") && (s.contains(".mp4") || s.contains("video")))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_data_wins() {
        let body = r#"{"code":200,"data":{"url":"https://cdn.test/a.mp4","title":"hi"},"url":"https://other"}"#;
        let answer = parse_relay_body(body).unwrap();
        assert_eq!(answer.media_url, "https://cdn.test/a.mp4");
        assert_eq!(answer.title.as_deref(), Some("hi"));
    }

    #[test]
    fn test_root_keys_and_alternate_names() {
        let answer = parse_relay_body(r#"{"nwm_video_url":"https://cdn.test/b","desc":"d"}"#).unwrap();
        assert_eq!(answer.media_url, "https://cdn.test/b");
        assert_eq!(answer.title.as_deref(), Some("d"));
    }

    #[test]
    fn test_error_code_is_rejected() {
        let err = parse_relay_body(r#"{"code":-1,"msg":"quota exceeded"}"#).unwrap_err();
        assert!(err.contains("quota exceeded"));
    }

    #[test]
    fn test_plain_text_url_accepted() {
        let answer = parse_relay_body("https://cdn.test/c.mp4\n").unwrap();
        assert_eq!(answer.media_url, "https://cdn.test/c.mp4");
        assert!(parse_relay_body("<html>").is_err());
        assert!(parse_relay_body("   ").is_err());
    }

    #[test]
    fn test_last_resort_scan() {
        let answer = parse_relay_body(r#"{"link":"https://cdn.test/x.mp4?sig=1"}"#).unwrap();
        assert_eq!(answer.media_url, "https://cdn.test/x.mp4?sig=1");
        assert!(parse_relay_body(r#"{"link":"https://cdn.test/page"}"#).is_err());
    }

    #[test]
    fn test_relay_url_escapes() {
        assert_eq!(
            relay_url("https://r.test/?url=", "https://v.douyin.com/a b/"),
            "https://r.test/?url=https%3A%2F%2Fv.douyin.com%2Fa%20b%2F"
        );
        assert_eq!(RELAYS.len(), 10);
    }
}
