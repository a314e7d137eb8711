//! Logging setup.
//!
//! The terminal belongs to the UI, so events go to a log file through a
//! non-blocking writer. `RUST_LOG` overrides the configured level.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Log file path {0:?} has no file name")]
    NoFileName(std::path::PathBuf),
    #[error("Failed to install the tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// The filter for `level` unless `RUST_LOG` is set.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs the global subscriber writing to `config.file`.
///
/// Keep the returned guard alive until exit; dropping it flushes the writer.
pub fn init(config: &LogConfig) -> Result<WorkerGuard, TelemetryError> {
    let file_name = config
        .file
        .file_name()
        .ok_or_else(|| TelemetryError::NoFileName(config.file.clone()))?;
    let directory = config
        .file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_needs_a_name() {
        let config = LogConfig {
            level: "info".into(),
            file: "/".into(),
        };
        assert!(matches!(init(&config), Err(TelemetryError::NoFileName(_))));
    }
}
