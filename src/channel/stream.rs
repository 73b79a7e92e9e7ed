//! Original (pre-interception) channel implementations.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crate::channel::{Channel, OutputChannel};

/// The process's real standard output or standard error.
#[derive(Debug, Clone, Copy)]
pub struct StdStream {
    channel: Channel,
}

impl StdStream {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub fn stdout() -> Self {
        Self::new(Channel::Out)
    }

    pub fn stderr() -> Self {
        Self::new(Channel::Err)
    }
}

impl OutputChannel for StdStream {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()> {
        match self.channel {
            Channel::Out => io::stdout().lock().write_all(buf),
            Channel::Err => io::stderr().lock().write_all(buf),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.channel {
            Channel::Out => io::stdout().flush(),
            Channel::Err => io::stderr().flush(),
        }
    }

    fn identity(&self) -> &str {
        match self.channel {
            Channel::Out => "std/stdout",
            Channel::Err => "std/stderr",
        }
    }
}

/// An in-memory channel capturing every byte written to it.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    buf: Mutex<Vec<u8>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Everything written so far, decoded lossily.
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn clear(&self) {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl OutputChannel for MemoryChannel {
    fn write_bytes(&self, buf: &[u8]) -> io::Result<()> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn identity(&self) -> &str {
        "memory"
    }
}
