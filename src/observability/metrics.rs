//! Metrics collection.
//!
//! # Responsibilities
//! - Define bridge metrics (captured records, passthrough, failures)
//! - Record through the `metrics` facade; the host picks the exporter
//!
//! # Metrics
//! - `stdio_bridge_captured_records_total` (counter): records dispatched, by channel
//! - `stdio_bridge_merged_exceptions_total` (counter): stack traces merged into one record
//! - `stdio_bridge_passthrough_writes_total` (counter): writes with no appender, by channel
//! - `stdio_bridge_dispatch_failures_total` (counter): backend failures, by channel
//! - `stdio_bridge_discarded_records_total` (counter): records dropped by strategy, by level
//! - `stdio_bridge_evicted_appenders_total` (counter): appenders of discarded contexts
//! - `stdio_bridge_installs_total` (counter): channel installs, by scope
//! - `stdio_bridge_restores_total` (counter): original channels restored
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op

use metrics::counter;

use crate::appender::LogLevel;
use crate::channel::Channel;
use crate::install::ScopeKind;

pub const CAPTURED_RECORDS_TOTAL: &str = "stdio_bridge_captured_records_total";
pub const MERGED_EXCEPTIONS_TOTAL: &str = "stdio_bridge_merged_exceptions_total";
pub const PASSTHROUGH_WRITES_TOTAL: &str = "stdio_bridge_passthrough_writes_total";
pub const DISPATCH_FAILURES_TOTAL: &str = "stdio_bridge_dispatch_failures_total";
pub const DISCARDED_RECORDS_TOTAL: &str = "stdio_bridge_discarded_records_total";
pub const EVICTED_APPENDERS_TOTAL: &str = "stdio_bridge_evicted_appenders_total";
pub const INSTALLS_TOTAL: &str = "stdio_bridge_installs_total";
pub const RESTORES_TOTAL: &str = "stdio_bridge_restores_total";

pub fn record_captured(channel: Channel, merged: bool) {
    counter!(CAPTURED_RECORDS_TOTAL, "channel" => channel.label()).increment(1);
    if merged {
        counter!(MERGED_EXCEPTIONS_TOTAL, "channel" => channel.label()).increment(1);
    }
}

pub fn record_passthrough(channel: Channel) {
    counter!(PASSTHROUGH_WRITES_TOTAL, "channel" => channel.label()).increment(1);
}

pub fn record_dispatch_failure(channel: Channel) {
    counter!(DISPATCH_FAILURES_TOTAL, "channel" => channel.label()).increment(1);
}

pub fn record_discarded(level: LogLevel) {
    counter!(DISCARDED_RECORDS_TOTAL, "level" => level.as_str()).increment(1);
}

pub fn record_evicted(count: usize) {
    counter!(EVICTED_APPENDERS_TOTAL).increment(count as u64);
}

pub fn record_install(scope: ScopeKind) {
    counter!(INSTALLS_TOTAL, "scope" => scope.as_str()).increment(1);
}

pub fn record_restore() {
    counter!(RESTORES_TOTAL).increment(1);
}
