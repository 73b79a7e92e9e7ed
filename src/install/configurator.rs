//! Installing and removing the intercepting channel pair.

use std::sync::Arc;

use crate::channel::{is_intercepting, Channel, ChannelPair, ChannelRef, InterceptingChannel, SystemOutput};
use crate::error::BridgeError;
use crate::registry::AppenderRegistry;

/// Key under which the shared configurator is published.
pub const CONFIGURATOR_KEY: &str = "stdio-bridge/configurator";

/// Identity every compatible configurator reports.
pub const CONFIGURATOR_IDENTITY: &str = "stdio-bridge/configurator/v1";

/// Performs the actual channel replacement for whichever copy of the bridge
/// asks first.
pub trait Configurator: Send + Sync {
    fn identity(&self) -> &str;

    /// Wrap the current originals in intercepting channels. Returns `false`
    /// if the channels were already intercepting.
    fn replace_outputs(&self, system: &SystemOutput) -> bool;

    /// Put the originals back. Returns `false` if nothing was intercepting.
    fn restore_outputs(&self, system: &SystemOutput) -> Result<bool, BridgeError> {
        restore_originals(system)
    }
}

/// The configurator shipped with this crate.
///
/// Published configurators outlive the bridge that built them, so this one
/// holds nothing but the shared registry. Channels it installs resolve the
/// writer through the thread's entered contexts.
pub struct StdioConfigurator {
    registry: Arc<AppenderRegistry>,
}

impl StdioConfigurator {
    pub fn new(registry: Arc<AppenderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AppenderRegistry> {
        &self.registry
    }

    fn wrap(&self, channel: Channel, current: &ChannelRef) -> ChannelRef {
        if is_intercepting(current.as_ref()) {
            return Arc::clone(current);
        }
        Arc::new(InterceptingChannel::new(
            channel,
            Arc::clone(current),
            Arc::clone(&self.registry),
        ))
    }
}

impl Configurator for StdioConfigurator {
    fn identity(&self) -> &str {
        CONFIGURATOR_IDENTITY
    }

    fn replace_outputs(&self, system: &SystemOutput) -> bool {
        loop {
            let current = system.snapshot();
            if is_intercepting(current.out.as_ref()) && is_intercepting(current.err.as_ref()) {
                return false;
            }
            let replacement = ChannelPair::new(
                self.wrap(Channel::Out, &current.out),
                self.wrap(Channel::Err, &current.err),
            );
            if system.compare_and_swap(&current, replacement) {
                return true;
            }
        }
    }
}

fn unwrap_original(channel: Channel, current: &ChannelRef) -> Result<Option<ChannelRef>, BridgeError> {
    if !is_intercepting(current.as_ref()) {
        return Ok(None);
    }
    current
        .interception()
        .map(|i| Some(i.original()))
        .ok_or(BridgeError::ForeignInterceptor(channel))
}

/// Swap the originals back in, for channels installed by any compatible copy.
pub fn restore_originals(system: &SystemOutput) -> Result<bool, BridgeError> {
    loop {
        let current = system.snapshot();
        let out = unwrap_original(Channel::Out, &current.out)?;
        let err = unwrap_original(Channel::Err, &current.err)?;
        if out.is_none() && err.is_none() {
            return Ok(false);
        }
        let restored = ChannelPair::new(
            out.unwrap_or_else(|| Arc::clone(&current.out)),
            err.unwrap_or_else(|| Arc::clone(&current.err)),
        );
        if system.compare_and_swap(&current, restored) {
            return Ok(true);
        }
    }
}
