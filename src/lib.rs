//! Routes standard output and standard error into structured logging.
//!
//! # Architecture Overview
//!
//! ```text
//!     host code                 SystemOutput (process-wide, swappable)
//!     write!(stdout(), ..) ───▶ ┌──────────────────────┐
//!                               │ InterceptingChannel  │── no appender ──▶ original channel
//!                               └─────────┬────────────┘
//!                                         │ resolve calling Context
//!                                         ▼
//!                               ┌──────────────────────┐
//!                               │  AppenderRegistry    │ (weak keys, pinned values)
//!                               └─────────┬────────────┘
//!                                         ▼
//!                               ┌──────────────────────┐    backend fails
//!                               │   LoggerAppender     │ ─────────────────▶ ExceptionHandlingStrategy
//!                               │ lines + trace blocks │
//!                               └─────────┬────────────┘
//!                                         ▼
//!                                    LogBackend (tracing)
//! ```

// Core subsystems
pub mod appender;
pub mod channel;
pub mod context;
pub mod lines;
pub mod registry;

// Installation and host surface
pub mod bridge;
pub mod exceptions;
pub mod install;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use appender::{LogBackend, LogLevel, LogRecord, RecordingBackend, TracingBackend};
pub use bridge::{BridgeBuilder, StdioBridge};
pub use channel::{Channel, ChannelWriter, SystemOutput};
pub use config::BridgeConfig;
pub use context::{Context, WeakContext};
pub use error::{BridgeError, BridgeResult};
pub use exceptions::{ConfiguredStrategyFactory, StrategyKind};
pub use install::DegradedScopePolicy;

/// Writer for the process-wide stdout, intercepted or not.
pub fn stdout() -> ChannelWriter {
    SystemOutput::global().writer(Channel::Out)
}

/// Writer for the process-wide stderr, intercepted or not.
pub fn stderr() -> ChannelWriter {
    SystemOutput::global().writer(Channel::Err)
}
