//! File logging via `tracing`.
//!
//! The TUI owns the terminal, so log lines go to daily-rotated files under
//! the XDG state directory instead of stderr.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

const LOG_PREFIX: &str = "soniccanvas.log";
const MAX_LOG_FILES: usize = 7;

static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. Level comes from `RUST_LOG`, default "info".
pub fn init_logging() -> Result<PathBuf, anyhow::Error> {
    let log_dir = log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: failed to clean up old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized in {}", log_dir.display());
    Ok(log_dir)
}

fn log_dir() -> Result<PathBuf, anyhow::Error> {
    let dir = match std::env::var("XDG_STATE_HOME") {
        Ok(xdg_state) => PathBuf::from(xdg_state).join("soniccanvas"),
        Err(_) => dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".local/state/soniccanvas"),
    };

    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    Ok(dir)
}

fn is_rotated_log(file_name: &str) -> bool {
    file_name
        .strip_prefix(LOG_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|date| date.matches('-').count() == 2)
}

/// Keeps only the newest `MAX_LOG_FILES` rotated logs.
fn cleanup_old_logs(log_dir: &Path) -> Result<(), anyhow::Error> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let file_name = path.file_name()?.to_string_lossy().to_string();
            if !is_rotated_log(&file_name) {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }

    Ok(())
}
