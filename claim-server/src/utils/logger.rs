//! Logging Infrastructure
//!
//! fmt subscriber with an env filter; `RUST_LOG` wins over the configured
//! level. With a log directory the output goes to a daily rolling file.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger on stdout
pub fn init_logger(log_level: &str) {
    init_logger_with_file(log_level, None);
}

/// Initialize the logger with optional file output
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logger_with_file(log_level: &str, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},tower_http=info")));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir
        && (dir.exists() || std::fs::create_dir_all(dir).is_ok())
    {
        let file_appender = tracing_appender::rolling::daily(dir, "claim-server");
        let _ = subscriber.with_ansi(false).with_writer(file_appender).try_init();
        return;
    }

    let _ = subscriber.try_init();
}
