//! Settings domain types and validation.
//!
//! Pure data: loading from a JSON file and applying environment overrides is
//! done here too, but reading the actual process environment is left to the
//! caller through a lookup closure.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of downloads running at once (also the worker count).
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default capacity of the pending-work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Desktop browser UA used for extraction and transfers.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Android browser UA used for Douyin requests.
pub const DEFAULT_MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub downloader: DownloaderSettings,
    pub ytdlp: YtDlpSettings,
    pub douyin: DouyinSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rotated log files; stdout only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DownloaderSettings {
    /// Directory every artifact is written to.
    pub output_dir: PathBuf,
    /// Worker pool size.
    pub max_concurrent: usize,
    /// Pending-work queue capacity; admission waits when full.
    pub queue_capacity: usize,
    pub ffmpeg_path: String,
    pub curl_path: String,
    /// Timeout for HEAD probes of candidate media URLs.
    pub probe_timeout_secs: u64,
    /// Maximum age of a file picked by the "most recent file" fallback.
    pub stale_window_secs: u64,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./downloads"),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ffmpeg_path: "ffmpeg".to_string(),
            curl_path: "curl".to_string(),
            probe_timeout_secs: 5,
            stale_window_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct YtDlpSettings {
    /// Program name or path of the extraction/transfer tool.
    pub path: String,
    pub user_agent: String,
    /// Cookies file used when a request brings none.
    pub cookies_file: Option<String>,
    pub proxy: Option<String>,
}

impl Default for YtDlpSettings {
    fn default() -> Self {
        Self {
            path: "yt-dlp".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookies_file: None,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DouyinSettings {
    /// Try the platform APIs before handing over to yt-dlp.
    pub enable_direct_api: bool,
    pub mobile_user_agent: String,
    pub api_timeout_secs: u64,
}

impl Default for DouyinSettings {
    fn default() -> Self {
        Self {
            enable_direct_api: true,
            mobile_user_agent: DEFAULT_MOBILE_USER_AGENT.to_string(),
            api_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Create settings with defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Parse settings from JSON; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(raw).map_err(|e| SettingsError::Malformed(e.to_string()))
    }

    /// Read and parse a JSON settings file.
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|e| SettingsError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Apply `VHUNTER_*` overrides obtained through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VHUNTER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VHUNTER_PORT") {
            self.server.port = parse_env("VHUNTER_PORT", &port)?;
        }
        if let Some(dir) = lookup("VHUNTER_OUTPUT_DIR") {
            self.downloader.output_dir = PathBuf::from(dir);
        }
        if let Some(n) = lookup("VHUNTER_MAX_CONCURRENT") {
            self.downloader.max_concurrent = parse_env("VHUNTER_MAX_CONCURRENT", &n)?;
        }
        if let Some(path) = lookup("VHUNTER_YTDLP_PATH") {
            self.ytdlp.path = path;
        }
        if let Some(level) = lookup("VHUNTER_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(dir) = lookup("VHUNTER_LOG_DIR") {
            self.log.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Settings loading or validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Port must be non-zero")]
    InvalidPort,

    #[error("Max concurrent downloads must be between 1 and 32, got {0}")]
    InvalidConcurrency(usize),

    #[error("Queue capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("Output directory cannot be empty")]
    EmptyOutputDir,

    #[error("yt-dlp path cannot be empty")]
    EmptyToolPath,

    #[error("Timeout for {0} must be non-zero")]
    ZeroTimeout(&'static str),

    #[error("Invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },

    #[error("Cannot read settings file {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("Malformed settings: {0}")]
    Malformed(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.server.port == 0 {
        return Err(SettingsError::InvalidPort);
    }

    let concurrency = settings.downloader.max_concurrent;
    if !(1..=32).contains(&concurrency) {
        return Err(SettingsError::InvalidConcurrency(concurrency));
    }

    if settings.downloader.queue_capacity == 0 {
        return Err(SettingsError::InvalidQueueCapacity);
    }

    if settings.downloader.output_dir.as_os_str().is_empty() {
        return Err(SettingsError::EmptyOutputDir);
    }

    if settings.ytdlp.path.trim().is_empty() {
        return Err(SettingsError::EmptyToolPath);
    }

    if settings.downloader.probe_timeout_secs == 0 {
        return Err(SettingsError::ZeroTimeout("probe"));
    }
    if settings.douyin.api_timeout_secs == 0 {
        return Err(SettingsError::ZeroTimeout("douyin api"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::with_defaults();
        assert!(validate_settings(&settings).is_ok());
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.downloader.max_concurrent, 3);
        assert_eq!(settings.downloader.queue_capacity, 100);
        assert_eq!(settings.downloader.stale_window_secs, 300);
        assert!(settings.douyin.enable_direct_api);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            Settings::from_json_str(r#"{"downloader":{"output_dir":"/data/videos"}}"#).unwrap();
        assert_eq!(settings.downloader.output_dir, PathBuf::from("/data/videos"));
        assert_eq!(settings.downloader.max_concurrent, 3);
        assert_eq!(settings.ytdlp.path, "yt-dlp");
    }

    #[test]
    fn test_malformed_json_is_reported() {
        assert!(matches!(
            Settings::from_json_str("{not json"),
            Err(SettingsError::Malformed(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VHUNTER_PORT", "9090"),
            ("VHUNTER_MAX_CONCURRENT", "5"),
            ("VHUNTER_LOG_DIR", "/var/log/vhunter"),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::with_defaults();
        settings
            .apply_env_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.downloader.max_concurrent, 5);
        assert_eq!(settings.log.dir, Some(PathBuf::from("/var/log/vhunter")));
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut settings = Settings::with_defaults();
        let err = settings
            .apply_env_overrides(|k| (k == "VHUNTER_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let mut settings = Settings::with_defaults();
        settings.downloader.max_concurrent = 0;
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"server":{"port":3000}}"#).unwrap();
        let settings = Settings::from_json_file(&path).unwrap();
        assert_eq!(settings.server.port, 3000);
        assert!(Settings::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
