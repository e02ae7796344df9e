// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console logging is always available. With the `file-logging` feature a
//! timestamped run folder receives one JSON file per known crate plus a
//! combined file, and old runs are pruned by age and count.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Filter combining the base level with per-crate debug flags
pub fn build_filter(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<EnvFilter> {
    let directives = debug_flags.to_filter_string(&config.level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter directives: {}", directives))
}

fn console_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed(),
    }
}

/// Install a console subscriber
///
/// Returns `Ok(false)` when a global subscriber was already installed; the
/// existing one is kept.
///
/// # Errors
///
/// Fails if the filter directives are invalid.
pub fn init_console_logging(
    config: &LoggingConfig,
    debug_flags: &CrateDebugFlags,
) -> Result<bool> {
    let filter = build_filter(config, debug_flags)?;

    let installed = Registry::default()
        .with(console_layer(config.format).with_filter(filter))
        .try_init()
        .is_ok();
    Ok(installed)
}

/// Keeps file writers alive; logs are flushed when dropped
#[cfg(feature = "file-logging")]
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: PathBuf,
}

#[cfg(feature = "file-logging")]
impl LoggingGuard {
    /// Folder of the current run
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

/// Install console and file logging
///
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       ├── mesh-agent.log
///       ├── mesh-config.log
///       └── mesh.log (combined)
/// ```
#[cfg(feature = "file-logging")]
pub fn init_logging(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    use tracing_appender::rolling;

    let base_log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("./logs"));

    let run_dir = base_log_dir.join(format!(
        "{}{}",
        RUN_PREFIX,
        Utc::now().format(RUN_TIMESTAMP_FORMAT)
    ));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create log directory: {}", run_dir.display()))?;

    cleanup_old_logs(&base_log_dir, config.retention_days, config.retention_runs)?;

    let mut layers = vec![console_layer(config.format)
        .with_filter(build_filter(config, debug_flags)?)
        .boxed()];
    let mut file_guards = Vec::new();

    for crate_name in crate::KNOWN_CRATES {
        let appender = rolling::daily(&run_dir, format!("{}.log", crate_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guards.push(guard);

        let directives = format!("{}=debug,off", crate::crate_target(crate_name));
        let filter = EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid log filter directives: {}", directives))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(filter)
                .boxed(),
        );
    }

    let (combined_writer, combined_guard) =
        tracing_appender::non_blocking(rolling::daily(&run_dir, "mesh.log"));
    file_guards.push(combined_guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(combined_writer)
            .with_target(true)
            .json()
            .with_filter(build_filter(config, debug_flags)?)
            .boxed(),
    );

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        run_dir,
    })
}

fn run_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(RUN_PREFIX)?;
    NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Remove run folders older than `retention_days`, then all but the newest
/// `retention_runs`. Other entries in `base_log_dir` are left alone.
///
/// Returns the number of folders removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(stamp) = run_timestamp(&path) {
            runs.push((path, stamp));
        }
    }

    // Newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (index, (path, stamp)) in runs.iter().enumerate() {
        if *stamp >= cutoff && index < retention_runs {
            continue;
        }
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(
                "Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_run(base: &Path, stamp: DateTime<Utc>) -> PathBuf {
        let dir = base.join(format!(
            "{}{}",
            RUN_PREFIX,
            stamp.format(RUN_TIMESTAMP_FORMAT)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_filter_accepts_level_and_flags() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-mesh-agent".to_string()]);
        assert!(build_filter(&LoggingConfig::default(), &flags).is_ok());
    }

    #[test]
    fn test_console_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        let flags = CrateDebugFlags::default();
        init_console_logging(&config, &flags).unwrap();
        assert!(!init_console_logging(&config, &flags).unwrap());
    }

    #[test]
    fn test_cleanup_by_age_and_count() {
        let dir = tempdir().unwrap();
        let now = Utc::now();

        let ancient = make_run(dir.path(), now - chrono::Duration::days(400));
        let oldest_recent = make_run(dir.path(), now - chrono::Duration::seconds(30));
        let middle = make_run(dir.path(), now - chrono::Duration::seconds(20));
        let newest = make_run(dir.path(), now - chrono::Duration::seconds(10));
        let unrelated = dir.path().join("keep-me");
        std::fs::create_dir_all(&unrelated).unwrap();

        let removed = cleanup_old_logs(dir.path(), 30, 2).unwrap();

        assert_eq!(removed, 2);
        assert!(!ancient.exists());
        assert!(!oldest_recent.exists());
        assert!(middle.exists());
        assert!(newest.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(cleanup_old_logs(&missing, 30, 10).unwrap(), 0);
    }

    #[test]
    fn test_run_timestamp_parsing() {
        assert!(run_timestamp(Path::new("/logs/run_20250101_120000")).is_some());
        assert!(run_timestamp(Path::new("/logs/run_latest")).is_none());
        assert!(run_timestamp(Path::new("/logs/archive")).is_none());
    }
}
