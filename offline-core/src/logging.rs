//! Structured logging init helper (§2.1 A4).
//!
//! Thin wrapper over `tracing-subscriber`'s env-filter + fmt layers, the
//! same combination the teacher wires up for its own binaries. Host
//! applications embedding this crate are free to install their own
//! subscriber instead; this is a convenience for standalone tools and tests.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading its filter directives
/// from `RUST_LOG`, defaulting to `info` when unset.
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}
