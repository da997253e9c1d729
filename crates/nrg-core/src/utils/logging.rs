//! Idempotent `tracing` subscriber setup. Defaults to `info`, overridable
//! with `NRG_LOG`, mirroring this corpus's `tracing_subscriber::fmt()...init()`
//! one-liners but routed through `EnvFilter` so per-step debug spans can be
//! turned on without a rebuild.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the global `tracing` subscriber on first call; later calls are
/// no-ops, so every constructor that wants logging guaranteed (`Solver::new`)
/// can call this unconditionally.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("NRG_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}
