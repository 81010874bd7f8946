//! Tracing setup: optional console output plus a plain-text log file

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. The returned guard flushes the file
/// writer on drop and must be held for the life of the process.
pub fn init_logging(config: &LoggingConfig, base_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console_output {
        let console = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false);
        layers.push(if config.json {
            console.json().boxed()
        } else {
            console.boxed()
        });
    }

    let mut guard = None;
    if let Some(path) = log_file_path(config, base_dir) {
        match open_file_writer(&path) {
            Ok((writer, file_guard)) => {
                let file = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);
                layers.push(if config.json {
                    file.json().boxed()
                } else {
                    file.boxed()
                });
                guard = Some(file_guard);
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log file {} ({}), file logging disabled",
                    path.display(),
                    e
                );
            }
        }
    }

    // A second init (tests, embedding) keeps the existing subscriber
    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();
    guard
}

/// Minimal stderr logging for commands that never submit orders
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}

/// `logging.log_file` relative to `base_dir`; `None` when disabled
pub fn log_file_path(config: &LoggingConfig, base_dir: &Path) -> Option<PathBuf> {
    let file = config.log_file.trim();
    if file.is_empty() {
        return None;
    }
    Some(base_dir.join(file))
}

/// `logging.run_log` relative to `base_dir`; `None` when disabled
pub fn run_log_path(config: &LoggingConfig, base_dir: &Path) -> Option<PathBuf> {
    let file = config.run_log.trim();
    if file.is_empty() {
        return None;
    }
    Some(base_dir.join(file))
}

fn open_file_writer(
    path: &Path,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "log file has no name")
    })?;

    // The appender panics if it cannot create the file, so check first
    std::fs::create_dir_all(&dir)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
