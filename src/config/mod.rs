//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BridgeConfig (validated, immutable)
//!     → StdioBridge::from_config / start_with
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → forwarded only if [capture] changed
//!     → host restarts capture with the new levels
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Installation settings are read once; only capture settings are live

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BridgeConfig, CaptureConfig, InstallConfig, ObservabilityConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
