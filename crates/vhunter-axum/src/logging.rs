//! Tracing initialization for the `vhunter` binary.
//!
//! Logs go to stdout and, when `log.dir` is set, to a daily-rotated file
//! (`vhunter.<date>`) through `tracing-appender`. `RUST_LOG` wins over the
//! configured level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use vhunter_core::LogSettings;

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process. Calling this twice is harmless.
pub fn init_tracing(log: &LogSettings) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &log.dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "vhunter");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false) // No ANSI colors in files
                    .compact();
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Failed to create log directory {}: {e}", dir.display());
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout).compact())
        .with(file_layer)
        .try_init()
        .ok(); // Ignore error if already initialized

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_with_file_layer_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogSettings {
            level: "debug".to_string(),
            dir: Some(dir.path().join("logs")),
        };
        let guard = init_tracing(&log);
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());

        let again = init_tracing(&LogSettings::default());
        assert!(again.is_none());
    }
}
