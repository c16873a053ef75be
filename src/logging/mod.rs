//! Logging setup.
//!
//! Console output is always on (plain or JSON). When a log directory is
//! configured, a daily rotating JSON file is written there as well; the admin
//! log viewer reads the newest of those files back.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

pub const LOG_FILE_PREFIX: &str = "moune.log";
pub const DEFAULT_TAIL_LINES: usize = 200;

/// Initializes the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let default_directive = format!(
        "moune_storefront={level},tower_http={level},sea_orm=warn",
        level = config.log_level()
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let (file_layer, guard) = match config.log_dir.as_deref() {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    // try_init so a second call (tests, seed binary) is harmless
    if config.log_json {
        let _ = registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init();
    } else {
        let _ = registry.with(fmt::layer().with_target(true)).try_init();
    }

    Ok(guard)
}

/// Finds the most recently modified log file in `dir`.
pub fn newest_log_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_log || !path.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(ts, _)| modified > *ts) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// Returns the last `lines` lines of the newest log file, oldest first.
pub fn tail_newest_log(dir: &Path, lines: usize) -> io::Result<Vec<String>> {
    let Some(path) = newest_log_file(dir)? else {
        return Ok(Vec::new());
    };

    let content = fs::read_to_string(path)?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].iter().map(|l| l.to_string()).collect())
}
