//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.
//! Every section has defaults, so an empty file is a valid configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::appender::LogLevel;
use crate::exceptions::StrategyKind;
use crate::install::DegradedScopePolicy;

/// Root configuration for the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// How captured output becomes log records.
    pub capture: CaptureConfig,

    /// Installation of the intercepting channels.
    pub install: InstallConfig,

    /// The bridge's own diagnostics.
    pub observability: ObservabilityConfig,
}

/// Capture settings applied when a context starts sending output to logging.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Level for lines written to stdout.
    pub out_level: LogLevel,

    /// Level for lines written to stderr.
    pub err_level: LogLevel,

    /// What to do when the backend fails to log a record.
    pub exception_handling: StrategyKind,

    /// Per-level strategy overrides, keyed by level name.
    pub exception_handling_overrides: HashMap<String, StrategyKind>,

    /// Merge printed stack traces into single records.
    pub merge_exceptions: bool,

    /// Prefix for record sources; the context name is used when unset.
    pub source_prefix: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            out_level: LogLevel::Info,
            err_level: LogLevel::Error,
            exception_handling: StrategyKind::WriteToOriginal,
            exception_handling_overrides: HashMap::new(),
            merge_exceptions: true,
            source_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Behavior when the shared process scope cannot be published to.
    pub degraded_scope: DegradedScopePolicy,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive for the bridge's own logs (e.g. "info", "stdio_bridge=debug").
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
