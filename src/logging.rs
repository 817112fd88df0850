use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock timestamps as `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimer;

impl FormatTime for LogTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}]", chrono::Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Install the global subscriber: one stdout layer and one append-only file layer.
///
/// The returned guard flushes the file writer on drop and must live as long as the process logs.
pub fn init(log_file: &Path, verbose: bool) -> Result<WorkerGuard> {
    let dir = match log_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    let file_name = log_file
        .file_name()
        .with_context(|| format!("log path has no file name: {}", log_file.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, file_name));
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stdout_layer = tracing_subscriber::fmt::layer().with_timer(LogTimer).with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_timer(LogTimer)
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("logging already initialized")?;
    Ok(guard)
}
