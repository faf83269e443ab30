use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keeps the background log writer alive; drop it on exit to flush.
#[must_use]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber. Logs go to stderr so streamed answers on
/// stdout stay clean. `RUST_LOG` overrides the default level.
pub fn init(verbose: bool) -> LogGuard {
    let default_level = if verbose { "scholar=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    let (file_writer, file_guard) = inner::file_writer();
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }

    if let Some(path) = inner::log_file_path() {
        tracing::info!(path = %path.display(), "Debug logging initialized");
    }

    LogGuard { _file: file_guard }
}

pub use inner::log_file_path;

#[cfg(feature = "debug-log")]
mod inner {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

    static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

    pub fn file_writer() -> (Option<NonBlocking>, Option<WorkerGuard>) {
        let log_path = PathBuf::from("scholar-debug.log");

        let file = match fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Failed to open log file: {e}");
                return (None, None);
            }
        };

        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        LOG_PATH.set(log_path).ok();

        (Some(non_blocking), Some(guard))
    }

    pub fn log_file_path() -> Option<&'static PathBuf> {
        LOG_PATH.get()
    }
}

#[cfg(not(feature = "debug-log"))]
mod inner {
    use std::path::PathBuf;
    use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

    #[inline(always)]
    pub fn file_writer() -> (Option<NonBlocking>, Option<WorkerGuard>) {
        (None, None)
    }

    #[inline(always)]
    pub const fn log_file_path() -> Option<&'static PathBuf> {
        None
    }
}
