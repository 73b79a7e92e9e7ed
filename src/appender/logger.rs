//! The line-to-record appender.
//!
//! # Responsibilities
//! - Assemble lines per writer thread
//! - Merge printed traces into single records
//! - Dispatch records to the backend and apply the failure strategy
//! - Release held text when a writer thread exits or the appender is dropped
//!
//! # Design Decisions
//! - Each thread gets its own partial-line buffer, so bytes from two threads
//!   never end up in one record
//! - The state lock is released before the backend is called
//! - A panicking backend counts as a failed dispatch
//! - Text that cannot be logged on exit or drop is written to the original channel

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use crate::appender::backend::{LogBackend, LogRecord};
use crate::appender::level::LogLevel;
use crate::appender::Appender;
use crate::channel::{Channel, ChannelRef};
use crate::error::{BackendError, DispatchError};
use crate::exceptions::ExceptionHandlingStrategy;
use crate::lines::{Assembled, BlockAssembler, LineAccumulator, LineClassifier};
use crate::observability::metrics;

thread_local! {
    static THREAD_EXIT: RefCell<ThreadExit> = RefCell::new(ThreadExit::new());
}

/// Appenders holding text for the current thread. Dropped with the thread's
/// locals, at which point each one releases that thread's state.
struct ThreadExit {
    id: ThreadId,
    watched: Vec<Weak<AppenderCore>>,
}

impl ThreadExit {
    fn new() -> Self {
        Self {
            id: thread::current().id(),
            watched: Vec::new(),
        }
    }

    fn watch(core: &Arc<AppenderCore>) {
        let weak = Arc::downgrade(core);
        let _ = THREAD_EXIT.try_with(|exit| {
            let Ok(mut exit) = exit.try_borrow_mut() else {
                return;
            };
            exit.watched.retain(|w| w.strong_count() > 0);
            if !exit.watched.iter().any(|w| w.ptr_eq(&weak)) {
                exit.watched.push(weak);
            }
        });
    }
}

impl Drop for ThreadExit {
    fn drop(&mut self) {
        for core in self.watched.drain(..).filter_map(|w| w.upgrade()) {
            core.release_thread(self.id);
        }
    }
}

#[derive(Default)]
struct LineState {
    accumulator: LineAccumulator,
    assembler: BlockAssembler,
}

impl LineState {
    fn accept(&mut self, bytes: &[u8], classifier: &dyn LineClassifier, out: &mut Vec<Assembled>) {
        for line in self.accumulator.accept(bytes) {
            self.assembler.push(line, classifier, out);
        }
    }

    fn finish(&mut self, classifier: &dyn LineClassifier, out: &mut Vec<Assembled>) {
        if let Some(partial) = self.accumulator.take_partial() {
            self.assembler.push(partial, classifier, out);
        }
        self.assembler.flush(out);
    }

    fn is_idle(&self) -> bool {
        self.accumulator.is_empty() && self.assembler.is_idle()
    }
}

struct AppenderCore {
    channel: Channel,
    level: LogLevel,
    source: String,
    original: ChannelRef,
    strategy: Arc<dyn ExceptionHandlingStrategy>,
    backend: Arc<dyn LogBackend>,
    classifier: Arc<dyn LineClassifier>,
    threads: Mutex<HashMap<ThreadId, LineState>>,
}

impl AppenderCore {
    fn lock_threads(&self) -> MutexGuard<'_, HashMap<ThreadId, LineState>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn to_record(&self, item: Assembled) -> LogRecord {
        let (message, error) = match item {
            Assembled::Line(line) => (line, None),
            Assembled::Block { header, error } => (header, Some(error)),
        };
        LogRecord {
            level: self.level,
            message,
            source: self.source.clone(),
            error,
        }
    }

    fn emit_guarded(&self, record: &LogRecord) -> Result<(), BackendError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.backend.emit(record))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(BackendError::Panicked(reason))
            }
        }
    }

    fn dispatch(&self, assembled: Vec<Assembled>) -> Result<(), DispatchError> {
        let mut unlogged = Vec::new();
        let mut last_error = None;

        for item in assembled {
            let record = self.to_record(item);
            metrics::record_captured(self.channel, record.error.is_some());

            let Err(err) = self.emit_guarded(&record) else {
                continue;
            };
            metrics::record_dispatch_failure(self.channel);
            if let Err(err) = self.strategy.handle(&record, &err) {
                unlogged.push(record.raw_text());
                last_error = Some(err);
            }
        }

        match last_error {
            Some(source) => Err(DispatchError::Unlogged { unlogged, source }),
            None => Ok(()),
        }
    }

    /// Dispatch with no caller left to hand a failure back to.
    fn dispatch_or_write(&self, assembled: Vec<Assembled>) {
        if assembled.is_empty() {
            return;
        }
        if let Err(err) = self.dispatch(assembled) {
            for line in err.unlogged() {
                let _ = self.original.write_bytes(format!("{line}\n").as_bytes());
            }
        }
    }

    fn finish_all(&self, threads: &mut HashMap<ThreadId, LineState>) -> Vec<Assembled> {
        let mut out = Vec::new();
        for state in threads.values_mut() {
            state.finish(self.classifier.as_ref(), &mut out);
        }
        threads.clear();
        out
    }

    fn release_thread(&self, id: ThreadId) {
        let assembled = {
            let mut threads = self.lock_threads();
            let mut out = Vec::new();
            if let Some(mut state) = threads.remove(&id) {
                state.finish(self.classifier.as_ref(), &mut out);
            }
            out
        };
        self.dispatch_or_write(assembled);
    }
}

/// Converts bytes written by one context on one channel into log records.
pub struct LoggerAppender {
    core: Arc<AppenderCore>,
}

impl LoggerAppender {
    pub fn new(
        channel: Channel,
        level: LogLevel,
        source: impl Into<String>,
        original: ChannelRef,
        strategy: Arc<dyn ExceptionHandlingStrategy>,
        backend: Arc<dyn LogBackend>,
        classifier: Arc<dyn LineClassifier>,
    ) -> Self {
        let core = AppenderCore {
            channel,
            level,
            source: source.into(),
            original,
            strategy,
            backend,
            classifier,
            threads: Mutex::new(HashMap::new()),
        };
        Self { core: Arc::new(core) }
    }

    pub fn source(&self) -> &str {
        &self.core.source
    }

    /// The channel that was installed before interception.
    pub fn original(&self) -> &ChannelRef {
        &self.core.original
    }

    /// Number of writer threads with text still held.
    pub fn held_threads(&self) -> usize {
        self.core.lock_threads().len()
    }
}

impl Appender for LoggerAppender {
    fn append(&self, bytes: &[u8]) -> Result<(), DispatchError> {
        let core = &self.core;
        let (assembled, held) = {
            let mut threads = core.lock_threads();
            let id = thread::current().id();
            let fresh = !threads.contains_key(&id);
            let state = threads.entry(id).or_default();
            let mut out = Vec::new();
            state.accept(bytes, core.classifier.as_ref(), &mut out);
            let held = !state.is_idle();
            if !held {
                threads.remove(&id);
            }
            (out, held && fresh)
        };
        if held {
            ThreadExit::watch(core);
        }
        core.dispatch(assembled)
    }

    fn flush(&self) -> Result<(), DispatchError> {
        let core = &self.core;
        let assembled = {
            let mut threads = core.lock_threads();
            let mut out = Vec::new();
            for state in threads.values_mut() {
                state.assembler.flush(&mut out);
            }
            threads.retain(|_, state| !state.is_idle());
            out
        };
        core.dispatch(assembled)
    }

    fn finish(&self) -> Result<(), DispatchError> {
        let assembled = {
            let mut threads = self.core.lock_threads();
            self.core.finish_all(&mut threads)
        };
        self.core.dispatch(assembled)
    }

    fn level(&self) -> LogLevel {
        self.core.level
    }

    fn channel(&self) -> Channel {
        self.core.channel
    }
}

impl Drop for LoggerAppender {
    fn drop(&mut self) {
        let assembled = {
            let mut threads = self.core.lock_threads();
            self.core.finish_all(&mut threads)
        };
        self.core.dispatch_or_write(assembled);
    }
}
