use serde::{Deserialize, Serialize};

/// One parsed progress reading from a transfer.
///
/// Text fields are kept verbatim from the downloader's output (`2.50MiB/s`,
/// `00:42`); empty means the line did not carry that field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub percent: f64,
    #[serde(default)]
    pub speed: String,
    #[serde(default)]
    pub eta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,
}

impl ProgressSample {
    /// A sample carrying only a percentage.
    #[must_use]
    pub fn at(percent: f64) -> Self {
        Self {
            percent,
            ..Self::default()
        }
    }
}
