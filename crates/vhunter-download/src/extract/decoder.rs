//! Schema-tolerant decoding of the extraction tool's JSON.
//!
//! The tool's output varies by extractor: numbers arrive as strings, fields
//! go missing or turn `null`. Every field here decodes to a plain default
//! instead of failing, and the result is a typed [`VideoDescriptor`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use vhunter_core::{Format, VideoDescriptor};

#[derive(Debug, Default, Deserialize)]
struct RawInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    duration_string: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumbnail: String,
    #[serde(default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    ext: String,
    #[serde(default, deserialize_with = "lenient_string")]
    extractor: String,
    #[serde(default, deserialize_with = "lenient_string")]
    webpage_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    uploader: String,
    #[serde(default, deserialize_with = "lenient_formats")]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    #[serde(default, deserialize_with = "lenient_string")]
    format_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    ext: String,
    #[serde(default, deserialize_with = "lenient_string")]
    resolution: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    format_note: String,
    #[serde(default, deserialize_with = "lenient_string")]
    quality: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    filesize_approx: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    url: String,
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(de)?))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_u64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u64>, D::Error> {
    let parsed = match Value::deserialize(de)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    };
    Ok(parsed)
}

fn lenient_formats<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<RawFormat>, D::Error> {
    let Value::Array(items) = Value::deserialize(de)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// `h:mm:ss` or `m:ss`.
fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

impl From<RawFormat> for Format {
    fn from(raw: RawFormat) -> Self {
        let resolution = if raw.resolution.is_empty() {
            raw.height.map(|h| format!("{h}p")).unwrap_or_default()
        } else {
            raw.resolution
        };
        let quality = if raw.format_note.is_empty() {
            raw.quality
        } else {
            raw.format_note
        };
        Self {
            format_id: raw.format_id,
            ext: raw.ext,
            resolution,
            quality,
            filesize: raw.filesize.or(raw.filesize_approx),
            url: Some(raw.url).filter(|u| !u.is_empty()),
        }
    }
}

/// Decode the tool's JSON output.
pub fn decode_descriptor(json: &str) -> Result<VideoDescriptor, serde_json::Error> {
    let raw: RawInfo = serde_json::from_str(json)?;

    let duration = if raw.duration_string.is_empty() {
        raw.duration.map(format_duration).unwrap_or_default()
    } else {
        raw.duration_string
    };

    let mut formats: Vec<Format> = raw.formats.into_iter().map(Format::from).collect();
    if formats.is_empty() && !raw.url.is_empty() {
        formats.push(Format {
            format_id: "default".to_string(),
            ext: if raw.ext.is_empty() { "mp4".to_string() } else { raw.ext },
            url: Some(raw.url),
            ..Format::default()
        });
    }

    let metadata: BTreeMap<String, String> = [
        ("extractor", raw.extractor),
        ("webpage_url", raw.webpage_url),
        ("uploader", raw.uploader),
    ]
    .into_iter()
    .filter(|(_, v)| !v.is_empty())
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Ok(VideoDescriptor {
        title: raw.title,
        duration,
        can_download: !formats.is_empty(),
        formats,
        thumbnail: raw.thumbnail,
        description: raw.description,
        metadata,
        ..VideoDescriptor::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typical_output() {
        let json = r#"{
            "title": "Clip",
            "duration": 125,
            "extractor": "generic",
            "formats": [
                {"format_id": "18", "ext": "mp4", "resolution": "640x360", "format_note": "360p", "filesize": 1048576, "url": "https://cdn/18"},
                {"format_id": "137", "ext": "mp4", "height": 1080, "quality": 8, "filesize_approx": "2097152.0"},
                "garbage",
                {"format_id": null, "ext": "webm", "filesize": -3}
            ]
        }"#;
        let d = decode_descriptor(json).unwrap();
        assert_eq!(d.title, "Clip");
        assert_eq!(d.duration, "2:05");
        assert!(d.can_download);
        assert_eq!(d.formats.len(), 3);
        assert_eq!(d.formats[0].quality, "360p");
        assert_eq!(d.formats[0].filesize, Some(1_048_576));
        assert_eq!(d.formats[1].resolution, "1080p");
        assert_eq!(d.formats[1].quality, "8");
        assert_eq!(d.formats[1].filesize, Some(2_097_152));
        assert!(d.formats[1].url.is_none());
        assert_eq!(d.formats[2].format_id, "");
        assert_eq!(d.formats[2].filesize, None);
        assert_eq!(d.metadata.get("extractor").map(String::as_str), Some("generic"));
    }

    #[test]
    fn test_duration_string_preferred() {
        let d = decode_descriptor(r#"{"title":"a","duration":3725,"duration_string":"1:02:05"}"#).unwrap();
        assert_eq!(d.duration, "1:02:05");
        let d = decode_descriptor(r#"{"title":"a","duration":3725.4}"#).unwrap();
        assert_eq!(d.duration, "1:02:05");
    }

    #[test]
    fn test_single_url_output() {
        let d = decode_descriptor(r#"{"title":"a","url":"https://cdn/x.webm","ext":"webm","formats":null}"#)
            .unwrap();
        assert_eq!(d.formats.len(), 1);
        assert_eq!(d.formats[0].ext, "webm");
        assert!(d.can_download);

        let empty = decode_descriptor(r#"{"title":"a"}"#).unwrap();
        assert!(!empty.can_download);
    }

    #[test]
    fn test_malformed_json() {
        assert!(decode_descriptor("{not json").is_err());
        assert!(decode_descriptor(r#""just text""#).is_err());
    }
}
