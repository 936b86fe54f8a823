//! Tracing subscriber setup for hosts embedding the engine

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to a
/// level derived from `verbosity` (0 = warn, 1 = info, 2 = debug, 3+ = trace).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(verbosity: u8) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

fn default_filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}
