//! Handling of logging backend failures.
//!
//! # Strategies
//! - `WriteToOriginal`: diagnostic plus the unlogged text on the original channel
//! - `Discard`: drop the record, counted in metrics
//! - `Propagate`: hand the failure back to the channel, which writes the
//!   unlogged text raw to the original channel
//!
//! # Design Decisions
//! - Strategies only ever write to the original channel, never to an
//!   intercepting one, so a failure cannot re-enter interception
//! - Chosen per severity level through a factory

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::appender::{LogLevel, LogRecord};
use crate::channel::ChannelRef;
use crate::error::BackendError;
use crate::observability::metrics;

/// Invoked when the logging backend fails to accept a record.
pub trait ExceptionHandlingStrategy: Send + Sync {
    /// Absorb the failure (`Ok`) or hand it back to the caller (`Err`).
    fn handle(&self, record: &LogRecord, error: &BackendError) -> Result<(), BackendError>;
}

/// Builds the strategy for one appender.
pub trait ExceptionHandlingStrategyFactory: Send + Sync {
    fn make(&self, level: LogLevel, original: ChannelRef) -> Arc<dyn ExceptionHandlingStrategy>;
}

/// Writes a diagnostic and the unlogged text to the original channel, then continues.
pub struct WriteToOriginal {
    original: ChannelRef,
}

impl WriteToOriginal {
    pub fn new(original: ChannelRef) -> Self {
        Self { original }
    }
}

impl ExceptionHandlingStrategy for WriteToOriginal {
    fn handle(&self, record: &LogRecord, error: &BackendError) -> Result<(), BackendError> {
        let text = format!(
            "stdio-bridge: failed to log output from {} ({}); original text follows\n{}\n",
            record.source,
            error,
            record.raw_text()
        );
        // The original channel is the last resort; nothing to do if it fails too.
        let _ = self.original.write_bytes(text.as_bytes());
        Ok(())
    }
}

/// Drops records the backend rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ExceptionHandlingStrategy for Discard {
    fn handle(&self, record: &LogRecord, _error: &BackendError) -> Result<(), BackendError> {
        metrics::record_discarded(record.level);
        Ok(())
    }
}

/// Re-raises every backend failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct Propagate;

impl ExceptionHandlingStrategy for Propagate {
    fn handle(&self, _record: &LogRecord, error: &BackendError) -> Result<(), BackendError> {
        Err(error.clone())
    }
}

/// Built-in strategy selection, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    WriteToOriginal,
    Discard,
    Propagate,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::WriteToOriginal => "write_to_original",
            StrategyKind::Discard => "discard",
            StrategyKind::Propagate => "propagate",
        })
    }
}

impl ExceptionHandlingStrategyFactory for StrategyKind {
    fn make(&self, _level: LogLevel, original: ChannelRef) -> Arc<dyn ExceptionHandlingStrategy> {
        match self {
            StrategyKind::WriteToOriginal => Arc::new(WriteToOriginal::new(original)),
            StrategyKind::Discard => Arc::new(Discard),
            StrategyKind::Propagate => Arc::new(Propagate),
        }
    }
}

/// Selects a strategy per level, with a default for levels not overridden.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredStrategyFactory {
    default: StrategyKind,
    overrides: HashMap<LogLevel, StrategyKind>,
}

impl ConfiguredStrategyFactory {
    pub fn new(default: StrategyKind) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, level: LogLevel, kind: StrategyKind) -> Self {
        self.overrides.insert(level, kind);
        self
    }

    pub fn kind_for(&self, level: LogLevel) -> StrategyKind {
        self.overrides.get(&level).copied().unwrap_or(self.default)
    }
}

impl ExceptionHandlingStrategyFactory for ConfiguredStrategyFactory {
    fn make(&self, level: LogLevel, original: ChannelRef) -> Arc<dyn ExceptionHandlingStrategy> {
        self.kind_for(level).make(level, original)
    }
}
