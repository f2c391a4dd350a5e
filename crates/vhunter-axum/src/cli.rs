//! Command-line flags and settings assembly.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use vhunter_core::{Settings, validate_settings};

/// Video download server.
#[derive(Debug, Parser)]
#[command(name = "vhunter", version, about)]
pub struct Cli {
    /// JSON settings file.
    #[arg(short, long, env = "VHUNTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides settings and environment).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind (overrides settings and environment).
    #[arg(long)]
    pub host: Option<String>,
}

impl Cli {
    /// Settings from the file, then the process environment, then flags.
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_with(|key| std::env::var(key).ok())
    }

    /// Like [`load_settings`](Self::load_settings) with an explicit
    /// environment lookup.
    pub fn load_settings_with<F>(&self, lookup: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match &self.config {
            Some(path) => Settings::from_json_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::with_defaults(),
        };
        settings.apply_env_overrides(lookup)?;
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        validate_settings(&settings).context("invalid settings")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_win_over_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vhunter.json");
        std::fs::write(&path, r#"{"server":{"port":3000,"host":"127.0.0.1"}}"#).unwrap();

        let cli = Cli::parse_from(["vhunter", "--config", path.to_str().unwrap(), "--port", "9999"]);
        let settings = cli
            .load_settings_with(|k| (k == "VHUNTER_PORT").then(|| "4000".to_string()))
            .unwrap();
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let cli = Cli::parse_from(["vhunter"]);
        let settings = cli
            .load_settings_with(|k| (k == "VHUNTER_MAX_CONCURRENT").then(|| "5".to_string()))
            .unwrap();
        assert_eq!(settings.downloader.max_concurrent, 5);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let cli = Cli::parse_from(["vhunter", "--port", "0"]);
        assert!(cli.load_settings_with(|_| None).is_err());
    }
}
