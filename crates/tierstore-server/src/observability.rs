//! Tracing setup for the tierstore binary.
//!
//! Events go to stdout through a `fmt` layer that sits behind a reloadable
//! `EnvFilter`. The binary starts at a fixed level before the configuration is
//! read and switches to `logging.level` once it is. `RUST_LOG` pins the filter
//! and wins over both.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the global subscriber at `level`. Later calls are no-ops.
pub fn init_tracing(level: &str) {
    let (filter, handle) = reload::Layer::new(startup_filter(level));
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// Switch the active filter to `level`.
///
/// Returns `false` when `RUST_LOG` pins the filter or no subscriber was
/// installed.
pub fn set_log_level(level: &str) -> bool {
    if env_filter().is_some() {
        return false;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    handle.reload(EnvFilter::new(level)).is_ok()
}

fn startup_filter(level: &str) -> EnvFilter {
    env_filter().unwrap_or_else(|| EnvFilter::new(level))
}

/// The filter from `RUST_LOG`, if set and parseable.
fn env_filter() -> Option<EnvFilter> {
    std::env::var_os(EnvFilter::DEFAULT_ENV)?;
    EnvFilter::try_from_default_env().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_change_is_refused_without_a_subscriber() {
        assert!(!set_log_level("debug"));
    }
}
