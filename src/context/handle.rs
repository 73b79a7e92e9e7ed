//! Context handles.
//!
//! # Responsibilities
//! - Give each isolation unit a stable, comparable identity
//! - Pin appenders for the lifetime of the context
//! - Allow non-owning observation of the context's lifetime

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use crate::appender::Appender;
use crate::channel::Channel;
use crate::context::resolver::ContextGuard;
use crate::registry::RegistryId;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

static ROOT_CONTEXT: OnceLock<Context> = OnceLock::new();

/// Opaque identity of a context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

struct ContextInner {
    id: ContextId,
    name: String,
    // Keyed by registry too, so separate registries never evict each other's pins.
    pinned: Mutex<HashMap<(RegistryId, Channel), Arc<dyn Appender>>>,
}

/// A logical isolation unit owning one appender per channel.
///
/// Cloning is cheap and every clone refers to the same context. The context
/// is destroyed when the last clone is dropped.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a new context with a human readable name.
    pub fn new(name: impl Into<String>) -> Self {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(ContextInner {
                id,
                name: name.into(),
                pinned: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The process root context, used when a thread has not entered any context.
    /// It lives for the whole process.
    pub fn root() -> Context {
        ROOT_CONTEXT.get_or_init(|| Context::new("root")).clone()
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Observe this context without keeping it alive.
    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Make this context the calling context of the current thread until the
    /// returned guard is dropped.
    pub fn enter(&self) -> ContextGuard {
        ContextGuard::push(self.clone())
    }

    /// Keep `appender` alive for as long as this context lives. Returns the
    /// appender previously pinned by `registry` for `channel`.
    pub(crate) fn pin(
        &self,
        registry: RegistryId,
        channel: Channel,
        appender: Arc<dyn Appender>,
    ) -> Option<Arc<dyn Appender>> {
        self.inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((registry, channel), appender)
    }

    pub(crate) fn unpin(&self, registry: RegistryId, channel: Channel) -> Option<Arc<dyn Appender>> {
        self.inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(registry, channel))
    }

    /// Number of appenders currently pinned on this context.
    pub fn pinned_count(&self) -> usize {
        self.inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Non-owning reference to a context.
#[derive(Clone)]
pub struct WeakContext {
    id: ContextId,
    inner: Weak<ContextInner>,
}

impl WeakContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Context> {
        self.inner.upgrade().map(|inner| Context { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContext")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
