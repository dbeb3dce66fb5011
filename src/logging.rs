//! Opt-in `tracing` subscriber.
//!
//! The engine owns the terminal while it runs, so log lines must never go
//! to stdout/stderr: a subscriber is only installed when `LIVETERM_LOG`
//! names a file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

/// Install a file-backed fmt subscriber if `LIVETERM_LOG` is set.
///
/// `default_level` applies when `RUST_LOG` is absent. Returns `false` when no
/// subscriber was installed (no log file, unopenable file, or a global
/// subscriber already set).
pub fn init_tracing(default_level: &str) -> bool {
    match EnvConfig::from_env().log_path {
        Some(path) => init_tracing_to_file(&path, default_level),
        None => false,
    }
}

pub fn init_tracing_to_file(path: &Path, default_level: &str) -> bool {
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .is_ok()
}
