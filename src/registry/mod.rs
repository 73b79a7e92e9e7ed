//! Appender registry subsystem.
//!
//! # Data Flow
//! ```text
//! StdioBridge::start (calling context)
//!     → store.rs put(context, channel, appender)
//!         → appender pinned on the context (strong)
//!         → registry entry keeps weak refs only
//!
//! InterceptingChannel::write
//!     → store.rs get(context, channel) → appender or none
//!
//! Host drops the context
//!     → pinned appenders drop with it
//!     → entry is dead, swept on the next put / lookup / purge
//! ```

pub mod store;

pub use store::{AppenderRegistry, RegistryId};
