//! Tracing setup: stderr plus a daily rolling file

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "gifcast.log";
const LOG_DIR_ENV: &str = "GIFCAST_LOG_PATH";
const LOG_RETENTION: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// `RUST_LOG` if set, `info` otherwise
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. The guard must outlive every log call
/// that should reach the file.
pub fn init_logging() -> Result<WorkerGuard> {
    let log_dir = log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;
    let pruned = prune_old_logs(&log_dir, LOG_RETENTION);

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!("Logging to {}", log_dir.display());
    if pruned > 0 {
        debug!("Removed {} log file(s) older than {:?}", pruned, LOG_RETENTION);
    }
    Ok(guard)
}

/// Stderr-only logging for when the log directory is unusable
pub fn init_stderr_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Where log files go: `GIFCAST_LOG_PATH`, else `~/Library/Logs/GifCast` on
/// macOS and the per-user state or data dir elsewhere
pub fn log_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    if cfg!(target_os = "macos") {
        let home = std::env::var_os("HOME").context("HOME is not set, cannot place log files")?;
        return Ok(PathBuf::from(home).join("Library/Logs/GifCast"));
    }

    let dirs = ProjectDirs::from("dev", "gifcast", "gifcast")
        .context("Failed to determine project directories for log path")?;
    let base = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(base.join("logs"))
}

fn is_stale_log(file_name: &str, modified: SystemTime, cutoff: SystemTime) -> bool {
    file_name.starts_with(LOG_FILE_PREFIX) && modified < cutoff
}

/// Delete rotated log files last written before `max_age` ago. Returns how
/// many were removed; unreadable entries are skipped.
fn prune_old_logs(dir: &Path, max_age: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            let modified = entry.metadata().and_then(|m| m.modified());
            match (entry.file_name().to_str(), modified) {
                (Some(name), Ok(modified)) => is_stale_log(name, modified, cutoff),
                _ => false,
            }
        })
        .filter(|entry| std::fs::remove_file(entry.path()).is_ok())
        .count()
}
