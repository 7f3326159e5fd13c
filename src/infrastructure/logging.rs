//! Logging system configuration and initialization
//!
//! This module provides the logging setup for harvest runs:
//! - Console and file output support
//! - Rotation of the previous run's log file by timestamped rename
//! - Structured JSON logging (optional)
//! - KST (Korea Standard Time) timestamps

#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

// Re-export LoggingConfig from config module
pub use crate::infrastructure::config::LoggingConfig;

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Dependencies that are only interesting at TRACE level
const QUIET_TARGETS: &[&str] = &[
    "sqlx::query=warn",
    "sqlx::sqlite=warn",
    "sqlx::mysql=warn",
    "chromiumoxide=warn",
    "tungstenite=warn",
    "hyper=warn",
    "tokio=info",
];

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Custom time formatter for KST (Korea Standard Time, UTC+9)
struct KstTimeFormatter;

impl FormatTime for KstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let kst_time = Utc::now().with_timezone(&kst());
        write!(w, "{}", kst_time.format("%Y-%m-%d %H:%M:%S%.3f %Z"))
    }
}

/// Log directory: configured one, otherwise `logs/` next to the executable
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    if let Some(dir) = &config.log_dir {
        return dir.clone();
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Rotate the existing log file by renaming it with its timestamp (KST)
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<PathBuf>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path)
        .with_context(|| format!("Failed to get log file metadata: {:?}", log_file_path))?;
    let file_time = metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or_else(|_| std::time::SystemTime::now());

    let datetime: DateTime<Utc> = file_time.into();
    let kst_datetime = datetime.with_timezone(&kst());

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, kst_datetime.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(Some(timestamped_path))
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    // Suppress verbose dependency logs unless TRACE level is specifically requested
    if !config.level.to_lowercase().contains("trace") {
        for directive in QUIET_TARGETS {
            filter = filter.add_directive(directive.parse()?);
        }
        filter = filter.add_directive(format!("place_harvester={}", config.level).parse()?);
    }

    Ok(filter)
}

/// Initialize logging with custom configuration
///
/// Unless the level is TRACE, SQL statements and CDP traffic are suppressed.
/// `RUST_LOG` overrides the configured filter entirely:
/// ```bash
/// RUST_LOG="debug,chromiumoxide=debug" place-harvester harvest
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let log_dir = get_log_directory(&config);
    let mut rotated = None;

    if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

        rotated = rotate_existing_log_file(&log_dir, &config.file_name)?;

        if config.auto_cleanup_logs {
            cleanup_old_logs(&log_dir, config.max_files)?;
        }
    }

    let env_filter = build_env_filter(&config)?;

    let file_layer = if config.file_output {
        let file_appender = rolling::never(&log_dir, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);

        // Store the guard globally to prevent it from being dropped
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(KstTimeFormatter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed()
        } else {
            // File layer with minimal formatting (time + level + message only)
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(KstTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(KstTimeFormatter)
            .with_target(false)
            .boxed()
    });

    Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("📝 Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&config.file_name));
    }
    if let Some(path) = rotated {
        info!("Rotated previous log file to: {:?}", path);
    }
    if config.level.to_lowercase().contains("trace") {
        info!("TRACE level active - SQL and CDP logs will be shown");
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Place Harvester System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("==========================================");
}

/// Keep the newest `max_files` log files, remove the rest
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".log"));

        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Sort by modification time (newest first)
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files as usize) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
    }

    #[test]
    fn test_log_directory_prefers_configured_dir() {
        let mut config = LoggingConfig::default();
        assert!(get_log_directory(&config).ends_with("logs"));

        config.log_dir = Some(PathBuf::from("/var/log/harvester"));
        assert_eq!(get_log_directory(&config), PathBuf::from("/var/log/harvester"));
    }

    #[test]
    fn test_rotate_renames_existing_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("run.log"), "previous run").unwrap();

        let rotated = rotate_existing_log_file(dir.path(), "run.log").unwrap().unwrap();

        assert!(!dir.path().join("run.log").exists());
        assert!(rotated.exists());
        let name = rotated.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("run.") && name.ends_with(".log"));
    }

    #[test]
    fn test_rotate_without_existing_file() {
        let dir = tempdir().unwrap();
        assert!(rotate_existing_log_file(dir.path(), "run.log").unwrap().is_none());
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        for (i, name) in ["a.log", "b.log", "c.log"].iter().enumerate() {
            let path = dir.path().join(name);
            std::fs::write(&path, "x").unwrap();
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(now - Duration::from_secs(60 * (i as u64 + 1))).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let removed = cleanup_old_logs(dir.path(), 2).unwrap();

        assert_eq!(removed, 1);
        assert!(dir.path().join("a.log").exists());
        assert!(dir.path().join("b.log").exists());
        assert!(!dir.path().join("c.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
