//! Tracing subscriber setup for the `imagineer` binary.
//!
//! Human-readable output goes to stderr so it never mixes with the monitor
//! view on stdout. When `[logging] log_dir` is set, the same events are also
//! written as JSON lines to a daily-rotated file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::LoggingSection;

const LOG_FILE_PREFIX: &str = "imagineer.log";
const FALLBACK_DIRECTIVE: &str = "info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level; `--verbose` raises the
/// configured level to `debug`. The returned guard flushes the file writer
/// and must be held until exit.
pub fn init(verbose: bool, logging: &LoggingSection) -> Option<WorkerGuard> {
    let directive = default_directive(verbose, logging);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_filter(env_filter(directive));

    let (file_layer, guard) = match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(env_filter(directive));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}

fn default_directive(verbose: bool, logging: &LoggingSection) -> &str {
    if verbose { "debug" } else { logging.level() }
}

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE))
}
