//! Log subscriber construction for the command-line tool
//!
//! The library never installs a global subscriber; the resulting
//! [`Dispatch`] is handed to [`crate::installer::Installer::set_logger`].

use std::path::Path;

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `hc_install=trace`
pub const LOG_ENV: &str = "HC_INSTALL_LOG";

fn default_directive(to_file: bool) -> &'static str {
    if to_file { "debug" } else { "warn" }
}

fn env_filter(to_file: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(to_file)))
}

/// Build a dispatch writing JSON lines to `log_file`, or text to stderr when `None`
///
/// The returned guard flushes buffered file output on drop and must be
/// kept alive for as long as logging is needed.
pub fn dispatch(log_file: Option<&Path>) -> std::io::Result<(Dispatch, Option<WorkerGuard>)> {
    let Some(path) = log_file else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter(false))
            .with_writer(std::io::stderr)
            .finish();
        return Ok((Dispatch::new(subscriber), None));
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("log file path {:?} has no file name", path),
        )
    })?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(true))
        .with_writer(writer)
        .finish();

    Ok((Dispatch::new(subscriber), Some(guard)))
}
