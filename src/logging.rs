//! Logging bootstrap for the `relay` binary.
//!
//! All user-visible behavior of a run is carried by structured log lines;
//! there is no other reporting channel. The subscriber is installed once at
//! startup and components attach their context (`entity`, `table`,
//! `query_id`, `source`) as fields on each event.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise `default_level` applies.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
