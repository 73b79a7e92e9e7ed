//! Output channel subsystem.
//!
//! # Data Flow
//! ```text
//! Application code
//!     → system.rs (SystemOutput: the current OUT/ERR pair)
//!     → intercepting.rs (resolve context → registry → appender)
//!         → appender found: LoggerAppender assembles lines and logs them
//!         → no appender:    raw bytes to the original channel
//!     → stream.rs (original channels: process stdio or in-memory)
//! ```
//!
//! # Design Decisions
//! - The pair of channels is swapped as one unit; observers never see a
//!   half-installed pair
//! - Intercepting channels are recognized by a stable identity string, not by
//!   Rust type, so independently built copies recognize each other
//! - Every interception is reversible: the original is always retrievable

pub mod intercepting;
pub mod stream;
pub mod system;

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::appender::Appender;
use crate::context::Context;
use crate::error::BridgeError;

pub use intercepting::InterceptingChannel;
pub use stream::{MemoryChannel, StdStream};
pub use system::{ChannelPair, ChannelWriter, SystemOutput};

/// Identity reported by every intercepting channel implementation.
pub const INTERCEPTOR_IDENTITY: &str = "stdio-bridge/intercepting-channel/v1";

/// Shared handle to an output channel implementation.
pub type ChannelRef = Arc<dyn OutputChannel>;

/// One of the two standard text output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Out,
    Err,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Out, Channel::Err];

    pub fn label(self) -> &'static str {
        match self {
            Channel::Out => "stdout",
            Channel::Err => "stderr",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A process-wide text output stream implementation.
pub trait OutputChannel: Send + Sync {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;

    /// Stable identity of the implementation.
    fn identity(&self) -> &str;

    /// The interception interface, if this channel intercepts another.
    fn interception(&self) -> Option<&dyn Interception> {
        None
    }
}

/// Operations exposed by an intercepting channel to whichever copy of the
/// bridge finds it installed.
pub trait Interception: Send + Sync {
    /// The wrapped pre-interception channel.
    fn original(&self) -> ChannelRef;

    /// Route `context`'s writes to `appender`, replacing any previous one.
    fn register(&self, context: &Context, appender: Arc<dyn Appender>);

    /// Stop routing `context`'s writes, flushing anything the appender still holds.
    fn deregister(&self, context: &Context) -> Result<(), BridgeError>;

    /// Release trace blocks `context`'s appender is holding. Returns `false`
    /// if `context` has no appender on this channel.
    fn flush_context(&self, context: &Context) -> bool;
}

/// True when `channel` is an intercepting implementation from any copy of the bridge.
pub fn is_intercepting(channel: &dyn OutputChannel) -> bool {
    channel.identity() == INTERCEPTOR_IDENTITY
}

/// Identity comparison of two channel handles.
pub fn same_channel(a: &ChannelRef, b: &ChannelRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
