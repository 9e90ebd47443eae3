//! Tracing setup shared by binaries embedding the drive.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,chatfs_core=debug,chatfs_http=debug";

/// `RUST_LOG` if set and valid, else [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global fmt subscriber unless the embedding binary already
/// installed one.
pub fn init() {
    if tracing_subscriber::fmt().with_env_filter(env_filter()).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
