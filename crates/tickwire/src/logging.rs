//! Logging setup.
//!
//! Libraries only emit `tracing` events; installing a subscriber is the
//! application's call. This module is the shortcut for applications that
//! just want readable console output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::TickwireError;

/// Installs a console subscriber.
///
/// `RUST_LOG` wins if set; otherwise `default_filter` is used
/// (for example `"info,tickwire_dispatch=debug"`).
///
/// # Errors
/// [`TickwireError::Logging`] if a global subscriber is already set.
pub fn init(default_filter: &str) -> Result<(), TickwireError> {
    // An unparsable default falls back to plain "info".
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| default_env_filter());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .try_init()
        .map_err(|e| TickwireError::Logging(e.to_string()))?;

    tracing::debug!(default_filter, "logging initialized");
    Ok(())
}

/// The filter used when neither `RUST_LOG` nor the given default parses.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}
