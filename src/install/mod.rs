//! Installation subsystem.
//!
//! # Data Flow
//! ```text
//! install():
//!     already intercepting? → no-op
//!     probe shared scope → found compatible configurator → use it
//!                        → nothing there → publish ours → use the winner
//!                        → denied → DegradedScopePolicy (local or fail)
//!     configurator.replace_outputs() → CAS on SystemOutput
//!
//! uninstall():
//!     intercepting? → unwrap originals → CAS back
//! ```
//!
//! # Design Decisions
//! - Every copy of the bridge shares one configurator through the scope, so
//!   only one set of intercepting channels and one registry exist
//! - Restore works on any compatible intercepting channel, not just our own

pub mod configurator;
pub mod manager;
pub mod scope;

pub use configurator::{
    restore_originals, Configurator, StdioConfigurator, CONFIGURATOR_IDENTITY, CONFIGURATOR_KEY,
};
pub use manager::{DegradedScopePolicy, InstallOutcome, InstallationManager, ScopeKind};
pub use scope::{ProcessScope, ReadOnlyScope, SharedScope};
