//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for the host binary
//! - Keep the subscriber's own writer off the intercepted channels
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and `RUST_LOG`
//! - Writes to the process's real stderr; the bridge's channels are
//!   swappable handles, so the subscriber never re-enters them

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Build the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.is_ok()
}
