//! Tracing subscriber setup for the `dmm` binary.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Per-run log file name inside `logs_home`.
pub fn log_file_path(logs_home: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%d_%H_%M_%S");
    logs_home.join(format!("dmm_{stamp}.log"))
}

fn open_log_file(logs_home: &Path) -> std::io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(logs_home)?;
    let path = log_file_path(logs_home);
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Install the global subscriber: stderr plus a log file in `logs_home`.
///
/// `RUST_LOG` takes precedence; otherwise the level is INFO, or DEBUG with
/// `verbose`. Returns the log file path when the file layer was installed;
/// `None` if the file could not be opened or a subscriber was already set.
pub fn init(logs_home: &Path, verbose: bool) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let (log_path, file_layer, open_error) = match open_log_file(logs_home) {
        Ok((path, file)) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(path), Some(layer), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed (e.g. by a test harness).
    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
    {
        debug!("Keeping the existing tracing subscriber: {}", e);
        return None;
    }

    if let Some(e) = open_error {
        warn!(
            "Cannot open a log file in {}: {}. Logging to console only.",
            logs_home.display(),
            e
        );
    }
    log_path
}
