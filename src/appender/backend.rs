//! Logging backends receiving finished records.
//!
//! # Responsibilities
//! - Define the record handed to the logging system
//! - Emit records as `tracing` events
//! - Keep records in memory for hosts that inspect them

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::appender::level::LogLevel;
use crate::error::BackendError;
use crate::lines::CapturedError;

/// Target of every `tracing` event produced from captured output.
pub const CAPTURED_TARGET: &str = "stdio_bridge::captured";

/// One logical log record produced from captured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    /// The line without its terminator, or the header line of a merged trace.
    pub message: String,
    /// Label of the logical source, e.g. `plugin-a.stdout`.
    pub source: String,
    pub error: Option<CapturedError>,
}

impl LogRecord {
    /// The text as it was originally written, without the final terminator.
    pub fn raw_text(&self) -> String {
        match &self.error {
            Some(error) => error.render().trim_end_matches('\n').to_string(),
            None => self.message.clone(),
        }
    }
}

/// The structured logging system the bridge feeds.
pub trait LogBackend: Send + Sync {
    fn emit(&self, record: &LogRecord) -> Result<(), BackendError>;
}

/// Emits records as `tracing` events on [`CAPTURED_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBackend;

macro_rules! captured_event {
    ($level:expr, $record:expr) => {
        tracing::event!(
            target: CAPTURED_TARGET,
            $level,
            source = %$record.source,
            exception = $record.error.as_ref().map(tracing::field::display),
            frames = $record.error.as_ref().map(|e| e.total_frames()),
            "{}",
            $record.message
        )
    };
}

impl LogBackend for TracingBackend {
    fn emit(&self, record: &LogRecord) -> Result<(), BackendError> {
        match record.level {
            LogLevel::Trace => captured_event!(tracing::Level::TRACE, record),
            LogLevel::Debug => captured_event!(tracing::Level::DEBUG, record),
            LogLevel::Info => captured_event!(tracing::Level::INFO, record),
            LogLevel::Warn => captured_event!(tracing::Level::WARN, record),
            LogLevel::Error => captured_event!(tracing::Level::ERROR, record),
        }
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl LogBackend for RecordingBackend {
    fn emit(&self, record: &LogRecord) -> Result<(), BackendError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
