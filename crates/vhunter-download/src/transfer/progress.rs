//! Line grammar of the transfer tool's output.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use vhunter_core::ProgressSample;

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)%").expect("valid regex"));

static SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*\s*[KMG]?i?B/s)").expect("valid regex"));

static ETA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ETA\s+(\d+:\d+)").expect("valid regex"));

static SIZES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.?\d*\s*[KMG]?i?B)\s+of\s+~?\s*(\d+\.?\d*\s*[KMG]?i?B)").expect("valid regex")
});

static MERGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[Merger\] Merging formats into "(.+)""#).expect("valid regex"));

static ALREADY_DONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[download\] (.+) has already been downloaded").expect("valid regex")
});

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    const fn destination_marker(self) -> &'static str {
        match self {
            Self::Stdout => "Destination:",
            Self::Stderr => "[download] Destination:",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Parse a progress line. `None` unless it carries a numeric percentage.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    if !line.contains('%') {
        return None;
    }
    let percent: f64 = PERCENT.captures(line)?.get(1)?.as_str().parse().ok()?;
    let capture = |re: &Regex| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    let (downloaded, total_size) = SIZES.captures(line).map_or((None, None), |c| {
        (
            c.get(1).map(|m| m.as_str().to_string()),
            c.get(2).map(|m| m.as_str().to_string()),
        )
    });
    Some(ProgressSample {
        percent,
        speed: capture(&SPEED).unwrap_or_default(),
        eta: capture(&ETA).unwrap_or_default(),
        downloaded,
        total_size,
    })
}

/// Path announced as the file being written, if this line announces one.
pub fn destination_of(line: &str, stream: StreamKind) -> Option<PathBuf> {
    if let Some(c) = ALREADY_DONE.captures(line) {
        return Some(PathBuf::from(c[1].trim()));
    }
    let marker = stream.destination_marker();
    let start = line.find(marker)? + marker.len();
    let path = line[start..].trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Final container path announced by the tool's own merger.
pub fn merge_target_of(line: &str) -> Option<PathBuf> {
    MERGER.captures(line).map(|c| PathBuf::from(&c[1]))
}
