//! Context subsystem.
//!
//! # Data Flow
//! ```text
//! Host creates Context (plugin, module, sub-application)
//!     → handle.rs (identity, pinned appenders, weak observation)
//!     → resolver.rs (which context is calling right now)
//!     → registry keys lookups by the resolved ContextId
//! ```
//!
//! # Design Decisions
//! - A context dies when the host drops its last handle; nothing in this
//!   crate is told about it
//! - Appenders are pinned on the context, so they live exactly as long as it does
//! - The registry only ever sees `WeakContext`

pub mod handle;
pub mod resolver;

pub use handle::{Context, ContextId, WeakContext};
pub use resolver::{
    current_context, ContextGuard, ContextResolver, FixedContextResolver, ThreadContextResolver,
};
