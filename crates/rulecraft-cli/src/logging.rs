use std::fs::{File, OpenOptions, create_dir_all};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::CliError;

const LOG_FILE: &str = "rulecraft.ndjson";

/// Install json file logging under `logs_dir` plus a human-readable stderr layer.
///
/// The stderr level follows `RUST_LOG` when set, otherwise `verbosity`.
pub fn init_logging(logs_dir: &Path, verbosity: u8) -> Result<PathBuf, CliError> {
    let (path, file) = open_log_file(logs_dir)?;

    // One flat json object per event, appended across runs.
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new("info"));

    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| CliError::Logging(err.to_string()))?;

    Ok(path)
}

fn open_log_file(logs_dir: &Path) -> io::Result<(PathBuf, File)> {
    create_dir_all(logs_dir)?;
    let path = logs_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
