/// Structured logging to `$XDG_DATA_HOME/cpdash/cpdash.log`.
///
/// The TUI owns stdout, so log lines never go there. Filter comes from
/// `CPDASH_LOG` (EnvFilter syntax), defaulting to `info`.
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::prefs::data_dir;

pub const LOG_ENV: &str = "CPDASH_LOG";

pub fn log_path() -> PathBuf {
    data_dir().join("cpdash.log")
}

/// Install the global subscriber. When the log file cannot be opened, events
/// are discarded and the returned path is None.
pub fn init_tracing() -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let path = log_path();
    match open_log(&path) {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .compact()
                .with_writer(Mutex::new(file))
                .try_init();
            Ok(Some(path))
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .try_init();
            Ok(None)
        }
    }
}

fn open_log(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
