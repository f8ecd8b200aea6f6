//! Structured logging setup (SPEC_FULL.md §4.9).
//!
//! Mirrors the teacher's `tracing`/`tracing-subscriber` stack: an
//! `EnvFilter` driven subscriber writing to stdout, optionally layered with
//! a non-blocking file appender when the configuration's `log` section
//! enables one.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;

/// Initialises the global tracing subscriber. The returned `WorkerGuard`
/// must be kept alive for the lifetime of the process when file logging is
/// enabled; dropping it flushes and stops the background writer.
pub fn init(log: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log.enabled {
        if let Some(path) = log.path.as_deref() {
            let dir = std::path::Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "marketsync.log".to_string());

            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();

            return Some(guard);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    None
}
