//! Best-effort file logging for executed statements.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs a global subscriber appending to `dir/filename`.
///
/// Only the first call does anything; later calls return its outcome. When
/// the file cannot be opened, or another subscriber is already installed,
/// the problem is reported once on stderr and `false` is returned.
pub fn configure_file_logger(dir: &Path, filename: &str, level: &str) -> bool {
    *INSTALLED.get_or_init(|| match install(dir, filename, level) {
        Ok(()) => true,
        Err(message) => {
            eprintln!("[WARN] episode-db file logging disabled: {message}");
            false
        }
    })
}

fn install(dir: &Path, filename: &str, level: &str) -> Result<(), String> {
    let path = dir.join(filename);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("debug"));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| e.to_string())
}
