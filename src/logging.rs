//! Logging initialization for branch-manager.
//!
//! Logs go to stderr unless `logging.directory` is configured, in which case
//! they are written to `branch-manager-{datetime}.log` in that directory.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set when file logging is enabled)
    pub log_file_path: Option<PathBuf>,
}

/// Log file name for a given start time
pub fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("branch-manager-{}.log", now.format("%Y%m%dT%H%M%SZ"))
}

/// Where file logging writes for a run started at `now`, if it is enabled.
pub fn log_file_location(
    config: &LoggingConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<PathBuf> {
    config
        .directory
        .as_ref()
        .map(|dir| PathBuf::from(dir).join(log_file_name(now)))
}

/// Pick the filter directive: `--debug` beats the config level, `RUST_LOG` beats both.
fn filter_directive(config: &LoggingConfig, debug_override: bool) -> String {
    let level = if debug_override {
        "debug".to_string()
    } else {
        config.level.clone()
    };
    std::env::var("RUST_LOG").unwrap_or(level)
}

/// Initialize logging.
///
/// # Arguments
/// * `config` - Logging section of the configuration
/// * `debug_override` - If true, override log level to "debug" (from --debug flag)
///
/// # Returns
/// A `LoggingHandle` that must be kept alive for the duration of the program.
pub fn init_logging(config: &LoggingConfig, debug_override: bool) -> Result<LoggingHandle> {
    let filter = tracing_subscriber::EnvFilter::new(filter_directive(config, debug_override));

    if let Some(log_file_path) = log_file_location(config, chrono::Utc::now()) {
        let logs_dir = log_file_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        std::fs::create_dir_all(&logs_dir)?;

        let log_filename = log_file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false) // No ANSI codes in log files
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_format() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(log_file_name(at), "branch-manager-20260304T050607Z.log");
    }

    #[test]
    fn test_debug_override_wins_over_config() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig::default();
        assert_eq!(filter_directive(&config, false), "info");
        assert_eq!(filter_directive(&config, true), "debug");
    }

    #[test]
    fn test_stderr_when_no_directory() {
        // init_logging installs a global subscriber, so only the selection is checked here.
        let config = LoggingConfig::default();
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert!(log_file_location(&config, at).is_none());
    }

    #[test]
    fn test_log_file_location_in_configured_directory() {
        let config = LoggingConfig {
            directory: Some("/var/log/branch-manager".to_string()),
            ..LoggingConfig::default()
        };
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();

        assert_eq!(
            log_file_location(&config, at),
            Some(PathBuf::from(
                "/var/log/branch-manager/branch-manager-20260304T050607Z.log"
            ))
        );
    }
}
