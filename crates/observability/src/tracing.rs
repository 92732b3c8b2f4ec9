//! Tracing/logging initialization.
//!
//! Structured JSON logs with env-filter control; retry loops log at `debug`,
//! so `RUST_LOG=pixport_infra=debug` surfaces contention without drowning
//! the rest of the process.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Honors `RUST_LOG`; defaults to `info`. Safe to call multiple times
/// (subsequent calls are no-ops), which also makes it usable from tests.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    try_init(filter);
}

/// Initialize with explicit filter directives, ignoring the environment.
///
/// Useful for harnesses that want e.g. `"info,pixport_infra=debug"`
/// regardless of the caller's shell.
pub fn init_with_filter(directives: &str) {
    try_init(EnvFilter::new(directives));
}

fn try_init(filter: EnvFilter) {
    // JSON logs + timestamps; repeated initialization is ignored.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
