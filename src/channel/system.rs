//! The process-wide channel service.
//!
//! # Responsibilities
//! - Hold the current OUT/ERR implementations
//! - Swap both channels in one atomic step
//! - Hand out writers that follow whatever is currently installed, optionally
//!   entering a resolved context around each write
//!
//! # Design Decisions
//! - One `ArcSwap` cell for the pair: readers are lock-free and never see
//!   a half-installed pair
//! - Installers use compare-and-swap, so two racing copies cannot both win

use std::io;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use crate::channel::{is_intercepting, Channel, ChannelRef, StdStream};
use crate::context::{ContextGuard, ContextResolver};

static GLOBAL: OnceLock<Arc<SystemOutput>> = OnceLock::new();

/// The OUT/ERR pair installed at one point in time.
#[derive(Clone)]
pub struct ChannelPair {
    pub out: ChannelRef,
    pub err: ChannelRef,
}

impl ChannelPair {
    pub fn new(out: ChannelRef, err: ChannelRef) -> Self {
        Self { out, err }
    }

    pub fn get(&self, channel: Channel) -> &ChannelRef {
        match channel {
            Channel::Out => &self.out,
            Channel::Err => &self.err,
        }
    }
}

/// Process-wide owner of the current standard output channels.
pub struct SystemOutput {
    current: ArcSwap<ChannelPair>,
}

impl SystemOutput {
    pub fn new(out: ChannelRef, err: ChannelRef) -> Self {
        Self {
            current: ArcSwap::from_pointee(ChannelPair::new(out, err)),
        }
    }

    /// A service backed by the process's real stdout and stderr.
    pub fn from_std() -> Self {
        Self::new(Arc::new(StdStream::stdout()), Arc::new(StdStream::stderr()))
    }

    /// The process-wide instance, backed by the real stdio streams.
    pub fn global() -> Arc<SystemOutput> {
        GLOBAL.get_or_init(|| Arc::new(SystemOutput::from_std())).clone()
    }

    /// The currently installed implementation of `channel`.
    pub fn get(&self, channel: Channel) -> ChannelRef {
        self.current.load().get(channel).clone()
    }

    /// The currently installed pair.
    pub fn snapshot(&self) -> Arc<ChannelPair> {
        self.current.load_full()
    }

    /// Install `new` if the current pair is still `expected`. Returns whether
    /// the swap happened.
    pub fn compare_and_swap(&self, expected: &Arc<ChannelPair>, new: ChannelPair) -> bool {
        let previous = self.current.compare_and_swap(expected, Arc::new(new));
        Arc::ptr_eq(&previous, expected)
    }

    /// True when both channels are intercepting implementations.
    pub fn is_intercepting(&self) -> bool {
        let pair = self.current.load();
        is_intercepting(pair.out.as_ref()) && is_intercepting(pair.err.as_ref())
    }

    /// A writer that always targets the currently installed `channel`.
    pub fn writer(self: &Arc<Self>, channel: Channel) -> ChannelWriter {
        ChannelWriter {
            system: Arc::clone(self),
            channel,
            resolver: None,
        }
    }
}

/// `io::Write` handle over one channel of a [`SystemOutput`].
#[derive(Clone)]
pub struct ChannelWriter {
    system: Arc<SystemOutput>,
    channel: Channel,
    resolver: Option<Arc<dyn ContextResolver>>,
}

impl ChannelWriter {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Write as whichever context `resolver` names, rather than the one
    /// entered on the calling thread.
    pub fn within(mut self, resolver: Arc<dyn ContextResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn enter(&self) -> Option<ContextGuard> {
        self.resolver.as_ref().map(|r| r.current().enter())
    }
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _entered = self.enter();
        self.system.get(self.channel).write_bytes(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let _entered = self.enter();
        self.system.get(self.channel).write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let _entered = self.enter();
        self.system.get(self.channel).flush()
    }
}
