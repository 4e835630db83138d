//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Variable holding the filter directives, e.g. `esia_impact=debug`
pub const LOG_ENV: &str = "ESIA_LOG";

/// Filter used when `ESIA_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable global subscriber
///
/// Returns `false` if a global subscriber is already installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Install a JSON-lines global subscriber
///
/// Returns `false` if a global subscriber is already installed.
pub fn init_json_tracing() -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}
