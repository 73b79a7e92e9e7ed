//! Error taxonomy for the bridge.
//!
//! # Categories
//! - Installation failures: the shared scope could not be reached or published to
//! - Usage errors: stop without start, restore without install
//! - Dispatch failures: the logging backend rejected or panicked on a record
//!
//! # Design Decisions
//! - Nothing here ever escapes a channel `write`; the channel turns every
//!   failure into a passthrough write to the original stream
//! - Usage errors are logged as warnings by the bridge, never raised to the host

use thiserror::Error;

use crate::channel::Channel;
use crate::context::ContextId;

/// Errors surfaced by the bridge's host-facing operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No process-wide scope could host the shared configurator and the
    /// degraded (local) fallback is disallowed.
    #[error("unable to install intercepting channels: {0}")]
    InstallationFailure(#[from] ScopeError),

    /// Deregistration was requested for a context that never registered.
    #[error("no appender registered for context {context} on {channel}")]
    NoActiveAppender { context: ContextId, channel: Channel },

    /// The channel is not an intercepting channel, so there is nothing to stop or restore.
    #[error("{0} is not being intercepted")]
    NotIntercepting(Channel),

    /// The intercepting channel was installed by a copy that does not expose
    /// its interception interface.
    #[error("{0} is intercepted by a foreign implementation")]
    ForeignInterceptor(Channel),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] crate::config::loader::ConfigError),
}

/// Failures reaching the process-wide shared scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// Publishing into the shared scope is not permitted.
    #[error("access to shared scope denied: {0}")]
    AccessDenied(String),

    /// A configurator with an unexpected identity occupies the well-known key.
    #[error("shared scope key {key} holds an incompatible configurator ({found})")]
    Incompatible { key: String, found: String },
}

/// A logging backend failed to accept a record.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend rejected record: {0}")]
    Rejected(String),

    #[error("backend panicked: {0}")]
    Panicked(String),
}

/// Records that could not be logged and were not absorbed by the
/// exception handling strategy.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{} captured line(s) could not be logged: {source}", .unlogged.len())]
    Unlogged {
        /// Raw text of each record that was not logged, without terminators.
        unlogged: Vec<String>,
        #[source]
        source: BackendError,
    },
}

impl DispatchError {
    /// Lines that must still reach the original channel.
    pub fn unlogged(&self) -> &[String] {
        match self {
            DispatchError::Unlogged { unlogged, .. } => unlogged,
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
