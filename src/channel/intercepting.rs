//! The shared intercepting channel.
//!
//! # Responsibilities
//! - Stand in for a standard channel process-wide
//! - Route each write to the calling context's appender
//! - Pass writes through untouched when the context has no appender
//! - Keep the original channel retrievable for passthrough and restore
//!
//! # Design Decisions
//! - The writer is resolved through the contexts entered on the calling
//!   thread. The installed pair is shared by every copy of the bridge, so it
//!   holds no bridge's resolver
//! - Writes made while a dispatch is running on the same thread (for example
//!   a backend that prints) go straight to the original channel
//! - Nothing fails out of `write_bytes` except the original channel's own I/O errors

use std::cell::Cell;
use std::io;
use std::sync::Arc;

use crate::appender::Appender;
use crate::channel::{Channel, ChannelRef, Interception, OutputChannel, INTERCEPTOR_IDENTITY};
use crate::context::{current_context, Context};
use crate::error::{BridgeError, DispatchError};
use crate::observability::metrics;
use crate::registry::AppenderRegistry;

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as dispatching until dropped.
struct DispatchGuard {
    previous: bool,
}

impl DispatchGuard {
    fn enter() -> Self {
        let previous = DISPATCHING.try_with(|d| d.replace(true)).unwrap_or(false);
        DispatchGuard { previous }
    }

    fn active() -> bool {
        DISPATCHING.try_with(Cell::get).unwrap_or(false)
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        let _ = DISPATCHING.try_with(|d| d.set(previous));
    }
}

/// Process-wide replacement for one standard channel.
pub struct InterceptingChannel {
    channel: Channel,
    original: ChannelRef,
    registry: Arc<AppenderRegistry>,
}

impl InterceptingChannel {
    pub fn new(channel: Channel, original: ChannelRef, registry: Arc<AppenderRegistry>) -> Self {
        Self {
            channel,
            original,
            registry,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// The wrapped pre-interception channel.
    pub fn get_original(&self) -> &ChannelRef {
        &self.original
    }

    pub fn registry(&self) -> &Arc<AppenderRegistry> {
        &self.registry
    }

    fn passthrough(&self, buf: &[u8]) -> io::Result<()> {
        metrics::record_passthrough(self.channel);
        self.original.write_bytes(buf)
    }

    fn write_unlogged(&self, err: &DispatchError) {
        tracing::debug!(channel = %self.channel, error = %err, "Writing unlogged output to original channel");
        for line in err.unlogged() {
            let mut text = String::with_capacity(line.len() + 1);
            text.push_str(line);
            text.push('\n');
            let _ = self.original.write_bytes(text.as_bytes());
        }
    }

    /// Flush everything a retiring appender still holds.
    fn retire(&self, appender: Arc<dyn Appender>) {
        let _guard = DispatchGuard::enter();
        if let Err(err) = appender.finish() {
            self.write_unlogged(&err);
        }
    }
}

impl OutputChannel for InterceptingChannel {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()> {
        if DispatchGuard::active() {
            return self.original.write_bytes(buf);
        }

        let context = current_context();
        let Some(appender) = self.registry.get(&context, self.channel) else {
            return self.passthrough(buf);
        };

        let _guard = DispatchGuard::enter();
        if let Err(err) = appender.append(buf) {
            self.write_unlogged(&err);
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        if !DispatchGuard::active() {
            self.flush_context(&current_context());
        }
        self.original.flush()
    }

    fn identity(&self) -> &str {
        INTERCEPTOR_IDENTITY
    }

    fn interception(&self) -> Option<&dyn Interception> {
        Some(self)
    }
}

impl Interception for InterceptingChannel {
    fn original(&self) -> ChannelRef {
        Arc::clone(&self.original)
    }

    fn register(&self, context: &Context, appender: Arc<dyn Appender>) {
        if let Some(previous) = self.registry.put(context, self.channel, appender) {
            self.retire(previous);
        }
    }

    fn deregister(&self, context: &Context) -> Result<(), BridgeError> {
        let appender = self.registry.remove(context, self.channel)?;
        self.retire(appender);
        Ok(())
    }

    fn flush_context(&self, context: &Context) -> bool {
        let Some(appender) = self.registry.get(context, self.channel) else {
            return false;
        };
        let _guard = DispatchGuard::enter();
        if let Err(err) = appender.flush() {
            self.write_unlogged(&err);
        }
        true
    }
}
