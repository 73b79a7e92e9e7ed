//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (install, restore, usage warnings)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → logging.rs subscriber (real stderr, pretty or JSON)
//!     → whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - The bridge's own diagnostics never pass through the intercepted channels
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
