//! Line assembly subsystem.
//!
//! # Data Flow
//! ```text
//! Raw bytes from one writer thread
//!     → accumulator.rs (cut completed lines, keep the tail)
//!     → classifier.rs (header / cause / frame / plain)
//!     → BlockAssembler (hold trace headers, merge frames)
//!     → Assembled::Line or Assembled::Block(CapturedError)
//! ```

pub mod accumulator;
pub mod captured;
pub mod classifier;

pub use accumulator::{LineAccumulator, Lines};
pub use captured::CapturedError;
pub use classifier::{
    Assembled, BlockAssembler, LineClassifier, LineKind, PlainClassifier, TraceClassifier,
};
