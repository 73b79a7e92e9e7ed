//! Weakly-keyed appender store.
//!
//! # Responsibilities
//! - Map (context, channel) to the active appender
//! - Never keep a context, or anything it owns, alive
//! - Evict entries of contexts the host has discarded
//!
//! # Design Decisions
//! - Entries hold only weak references; the strong reference to an appender
//!   is pinned on its context
//! - Dead entries are swept on every `put` and evicted when a lookup finds them
//! - `DashMap` shards allow concurrent lookups while other shards are written

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::appender::Appender;
use crate::channel::Channel;
use crate::context::{Context, ContextId, WeakContext};
use crate::error::BridgeError;
use crate::observability::metrics;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one registry, used to keep its pins apart from other registries'.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegistryId(u64);

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry-{}", self.0)
    }
}

struct Entry {
    context: WeakContext,
    appender: Weak<dyn Appender>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.context.is_alive() && self.appender.strong_count() > 0
    }
}

/// Process-wide map from context to its appender per channel.
pub struct AppenderRegistry {
    id: RegistryId,
    entries: DashMap<(ContextId, Channel), Entry>,
}

impl Default for AppenderRegistry {
    fn default() -> Self {
        Self {
            id: RegistryId(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed)),
            entries: DashMap::new(),
        }
    }
}

impl AppenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Register `appender` for `context` on `channel`, replacing any previous
    /// one. Returns the replaced appender.
    pub fn put(
        &self,
        context: &Context,
        channel: Channel,
        appender: Arc<dyn Appender>,
    ) -> Option<Arc<dyn Appender>> {
        let entry = Entry {
            context: context.downgrade(),
            appender: Arc::downgrade(&appender),
        };
        // Pin while the shard is locked so the entry and the pin always agree.
        let slot = self.entries.entry((context.id(), channel)).insert(entry);
        let previous = context.pin(self.id, channel, appender);
        drop(slot);
        self.purge();
        previous
    }

    /// The appender registered for `context` on `channel`.
    pub fn get(&self, context: &Context, channel: Channel) -> Option<Arc<dyn Appender>> {
        let key = (context.id(), channel);
        let found = self.entries.get(&key).and_then(|e| e.appender.upgrade());
        if found.is_none() {
            self.entries.remove_if(&key, |_, e| !e.is_live());
        }
        found
    }

    /// Deregister `context` on `channel`, returning the retired appender.
    pub fn remove(&self, context: &Context, channel: Channel) -> Result<Arc<dyn Appender>, BridgeError> {
        let removed = self.entries.remove(&(context.id(), channel));
        let pinned = context.unpin(self.id, channel);
        pinned
            .filter(|_| removed.is_some())
            .ok_or(BridgeError::NoActiveAppender {
                context: context.id(),
                channel,
            })
    }

    /// Sweep entries whose context or appender is gone. Returns how many were evicted.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live());
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            metrics::record_evicted(evicted);
            tracing::debug!(evicted, "Evicted appenders of discarded contexts");
        }
        evicted
    }

    /// Entries currently held, including dead ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if an entry for `id` is still held, live or not.
    pub fn holds(&self, id: ContextId) -> bool {
        self.entries.iter().any(|e| e.key().0 == id)
    }
}
