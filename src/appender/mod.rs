//! Appender subsystem.
//!
//! # Data Flow
//! ```text
//! InterceptingChannel (context resolved, appender found)
//!     → logger.rs (per-thread line state, trace merging)
//!     → backend.rs (LogRecord → tracing event / memory)
//!     → on failure: exceptions::strategy decides
//! ```
//!
//! # Design Decisions
//! - One appender per (context, channel), owned by the context's pins
//! - Appenders never hold their context, so they cannot keep it alive

pub mod backend;
pub mod level;
pub mod logger;

pub use backend::{LogBackend, LogRecord, RecordingBackend, TracingBackend, CAPTURED_TARGET};
pub use level::LogLevel;
pub use logger::LoggerAppender;

use crate::channel::Channel;
use crate::error::DispatchError;

/// Turns bytes written by one context on one channel into log records.
pub trait Appender: Send + Sync {
    /// Consume bytes written by the calling thread.
    fn append(&self, bytes: &[u8]) -> Result<(), DispatchError>;

    /// Release held trace blocks. Partial lines stay buffered.
    fn flush(&self) -> Result<(), DispatchError>;

    /// Release everything, partial lines included. Called when the appender retires.
    fn finish(&self) -> Result<(), DispatchError>;

    fn level(&self) -> LogLevel;

    fn channel(&self) -> Channel;
}
