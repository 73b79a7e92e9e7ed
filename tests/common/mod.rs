//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use stdio_bridge::appender::RecordingBackend;
use stdio_bridge::bridge::{BridgeBuilder, StdioBridge};
use stdio_bridge::channel::{Channel, MemoryChannel, SystemOutput};
use stdio_bridge::install::{ProcessScope, SharedScope, StdioConfigurator, CONFIGURATOR_KEY};
use stdio_bridge::registry::AppenderRegistry;

/// Private channels, scope and registry, so tests never touch the real
/// process streams or each other.
pub struct Harness {
    pub out: Arc<MemoryChannel>,
    pub err: Arc<MemoryChannel>,
    pub system: Arc<SystemOutput>,
    pub scope: Arc<ProcessScope>,
    pub registry: Arc<AppenderRegistry>,
    pub backend: Arc<RecordingBackend>,
}

impl Harness {
    /// A harness whose scope already holds a configurator over `registry`,
    /// so every bridge built from it shares that registry.
    pub fn new() -> Self {
        let harness = Self::unpublished();
        let configurator = StdioConfigurator::new(Arc::clone(&harness.registry));
        harness
            .scope
            .publish(CONFIGURATOR_KEY, Arc::new(configurator))
            .expect("private scope accepts the configurator");
        harness
    }

    /// A harness with an empty scope.
    pub fn unpublished() -> Self {
        let out = Arc::new(MemoryChannel::new());
        let err = Arc::new(MemoryChannel::new());
        let system = Arc::new(SystemOutput::new(out.clone(), err.clone()));
        Self {
            out,
            err,
            system,
            scope: Arc::new(ProcessScope::new()),
            registry: Arc::new(AppenderRegistry::new()),
            backend: Arc::new(RecordingBackend::new()),
        }
    }

    /// Builder wired to this harness's channels, scope and backend.
    pub fn builder(&self) -> BridgeBuilder {
        StdioBridge::builder()
            .system(Arc::clone(&self.system))
            .scope(self.scope.clone())
            .backend(self.backend.clone())
    }

    pub fn bridge(&self) -> StdioBridge {
        self.builder().build()
    }

    pub fn original(&self, channel: Channel) -> &Arc<MemoryChannel> {
        match channel {
            Channel::Out => &self.out,
            Channel::Err => &self.err,
        }
    }

    /// Messages recorded for `source`, in order.
    pub fn messages_from(&self, source: &str) -> Vec<String> {
        self.backend
            .records()
            .into_iter()
            .filter(|r| r.source == source)
            .map(|r| r.message)
            .collect()
    }
}
