//! Exception handling subsystem.
//!
//! # Data Flow
//! ```text
//! LoggerAppender dispatch
//!     → backend.emit() fails (error or panic)
//!     → strategy.rs (per-level strategy decides)
//!         → absorbed: continue with the next record
//!         → propagated: channel writes the text raw to the original
//! ```

pub mod strategy;

pub use strategy::{
    ConfiguredStrategyFactory, Discard, ExceptionHandlingStrategy, ExceptionHandlingStrategyFactory,
    Propagate, StrategyKind, WriteToOriginal,
};
