//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr so that `--format json` output on stdout
//! stays machine-readable. File output rotates daily under the configured
//! log directory.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::error::{FlError, FlResult};

/// Prefix of the rotated log files.
const LOG_FILE_PREFIX: &str = "foodlog.log";

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Parse a level directive, falling back to `info` on garbage.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// # Arguments
/// * `level` - Filter directive, e.g. "info" or "fl_services=debug,info"
/// * `log_dir` - Directory for rotated log files (created if missing)
/// * `json_output` - Write the file layer as JSON lines
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> FlResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let file = if json_output {
        fmt::layer()
            .with_writer(writer)
            .json()
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| FlError::Config(format!("logging already initialized: {e}")))?;

    tracing::info!(level, dir = %log_dir.display(), json_output, "logging initialized");

    Ok(LogGuard { _guard: guard })
}

/// Initialize logging from the `[logging]` config section.
pub fn init_from_config(config: &LoggingConfig, log_dir: &Path) -> FlResult<LogGuard> {
    init_logging(&config.level, log_dir, config.json_output)
}

/// Initialize a minimal console-only logger for tests or quick CLI runs.
/// Subsequent calls are no-ops.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logging_is_reentrant() {
        init_console_logging("debug");
        init_console_logging("trace");
    }

    #[test]
    fn test_bad_directive_falls_back() {
        // Should not panic on an unparsable directive.
        let _ = build_filter("not a [valid directive");
    }
}
