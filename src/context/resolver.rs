//! Calling-context resolution.
//!
//! # Responsibilities
//! - Answer "which logical unit is writing right now"
//! - Track contexts entered on each thread
//!
//! # Design Decisions
//! - Per-thread stack of entered contexts, like a thread's context loader
//! - Threads that never entered a context resolve to `Context::root()`

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::context::handle::{Context, ContextId};

thread_local! {
    static ENTERED: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// Resolves the identity of the calling context.
pub trait ContextResolver: Send + Sync {
    fn current(&self) -> Context;
}

/// Resolves to the innermost context entered on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadContextResolver;

impl ContextResolver for ThreadContextResolver {
    fn current(&self) -> Context {
        current_context()
    }
}

/// Always resolves to the same context. Holds a strong reference, so the
/// context outlives the resolver.
///
/// Only decides which context a bridge registers and writes as. The
/// installed channels resolve writers through the thread's entered contexts.
#[derive(Debug, Clone)]
pub struct FixedContextResolver(pub Context);

impl ContextResolver for FixedContextResolver {
    fn current(&self) -> Context {
        self.0.clone()
    }
}

/// The innermost context entered on this thread, or the root context.
pub fn current_context() -> Context {
    ENTERED
        .try_with(|stack| stack.try_borrow().ok().and_then(|s| s.last().cloned()))
        .ok()
        .flatten()
        .unwrap_or_else(Context::root)
}

/// RAII guard returned by [`Context::enter`].
///
/// Dropping it removes the context from the thread's stack, releasing the
/// strong reference held while entered.
#[must_use = "the context is exited when the guard is dropped"]
pub struct ContextGuard {
    id: ContextId,
    // Entered contexts are thread-local.
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    pub(crate) fn push(context: Context) -> Self {
        let id = context.id();
        let _ = ENTERED.try_with(|stack| stack.borrow_mut().push(context));
        Self {
            id,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // The last reference may go here, and dropping a context releases
        // its appenders, so drop it after the stack is no longer borrowed.
        let exited = ENTERED
            .try_with(|stack| {
                let mut stack = stack.borrow_mut();
                let pos = stack.iter().rposition(|c| c.id() == self.id)?;
                Some(stack.remove(pos))
            })
            .ok()
            .flatten();
        drop(exited);
    }
}
