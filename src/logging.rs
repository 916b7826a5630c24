//! Ambient structured logging.
//!
//! `init_logging` mirrors the shape the storage benchmarks already expect
//! (`init_logging(verbosity, json, log_file)`): a verbosity count maps to
//! a filter level, and output is either human-readable or JSON-formatted
//! for machine consumption.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Idempotent across repeated
/// calls within a process (later calls are no-ops) because
/// `tracing_subscriber` only allows one global default.
///
/// - `verbosity`: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
/// - `json`: emit newline-delimited JSON events instead of human text.
/// - `log_file`: if set, append to this file instead of stderr.
///
/// # Errors
/// Returns an error if the log file cannot be opened for appending.
pub fn init_logging(verbosity: u8, json: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        if json {
            builder.json().with_writer(file).try_init()
        } else {
            builder.with_writer(file).try_init()
        }
    } else if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A second call in the same process fails to install a new global
    // subscriber; that's expected (e.g. repeated test setup) and not an
    // error worth surfacing.
    let _ = result;
    Ok(())
}
