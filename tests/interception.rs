//! Routing, passthrough, trace merging and install/restore behavior.

use std::io::{self, Write};
use std::sync::Arc;

use stdio_bridge::appender::{LogBackend, LogLevel, LogRecord, RecordingBackend};
use stdio_bridge::channel::{
    same_channel, Channel, ChannelRef, Interception, OutputChannel, SystemOutput,
    INTERCEPTOR_IDENTITY,
};
use stdio_bridge::context::{Context, FixedContextResolver};
use stdio_bridge::error::{BackendError, BridgeError, ScopeError};
use stdio_bridge::exceptions::StrategyKind;
use stdio_bridge::install::{DegradedScopePolicy, ReadOnlyScope};

mod common;

struct ClosedBackend;

impl LogBackend for ClosedBackend {
    fn emit(&self, _record: &LogRecord) -> Result<(), BackendError> {
        Err(BackendError::Rejected("appender closed".into()))
    }
}

/// Claims to be an intercepting channel but exposes nothing.
struct OpaqueInterceptor;

impl OutputChannel for OpaqueInterceptor {
    fn write_bytes(&self, _buf: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn identity(&self) -> &str {
        INTERCEPTOR_IDENTITY
    }
}

#[test]
fn test_unregistered_context_passes_through() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();

    let plugin = Context::new("plugin");
    {
        let _entered = plugin.enter();
        bridge
            .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
            .unwrap();
    }

    let mut out = bridge.stdout();
    out.write_all(b"root \xff bytes\n").unwrap();
    out.write_all(b"no newline").unwrap();

    assert_eq!(harness.out.contents(), b"root \xff bytes\nno newline".to_vec());
    assert!(harness.backend.is_empty());
}

#[test]
fn test_contexts_are_isolated() {
    let harness = common::Harness::new();
    let bridge = Arc::new(harness.bridge());

    let handles: Vec<_> = [("alpha", LogLevel::Info), ("beta", LogLevel::Debug)]
        .into_iter()
        .map(|(name, level)| {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                let context = Context::new(name);
                let _entered = context.enter();
                bridge
                    .start(level, LogLevel::Error, &StrategyKind::WriteToOriginal)
                    .unwrap();
                writeln!(bridge.stdout(), "hello from {name}").unwrap();
                writeln!(bridge.stderr(), "{name} complains").unwrap();
                bridge.stop();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(harness.messages_from("alpha.stdout"), vec!["hello from alpha"]);
    assert_eq!(harness.messages_from("beta.stdout"), vec!["hello from beta"]);
    assert_eq!(harness.messages_from("beta.stderr"), vec!["beta complains"]);

    let records = harness.backend.records();
    let alpha = records.iter().find(|r| r.source == "alpha.stdout").unwrap();
    let beta = records.iter().find(|r| r.source == "beta.stdout").unwrap();
    assert_eq!(alpha.level, LogLevel::Info);
    assert_eq!(beta.level, LogLevel::Debug);
    assert!(records
        .iter()
        .filter(|r| r.source.ends_with(".stderr"))
        .all(|r| r.level == LogLevel::Error));
    assert!(harness.out.contents().is_empty());
    assert!(harness.err.contents().is_empty());
}

#[test]
fn test_printed_trace_becomes_one_record() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();
    let plugin = Context::new("plugin");
    let _entered = plugin.enter();
    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();

    let mut err = bridge.stderr();
    err.write_all(b"before\napp.LoadException: plugin failed\n\tat app.Loader.load(Loader.java:10)\n")
        .unwrap();
    err.write_all(b"\tat app.Main.main(Main.java:3)\nCaused by: app.io.MissingFileError: gone\n")
        .unwrap();
    err.write_all(b"\tat app.io.Files.open(Files.java:88)\n\t... 2 more\nafter\n").unwrap();

    let records = harness.backend.records();
    let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, vec!["before", "app.LoadException: plugin failed", "after"]);

    let error = records[1].error.as_ref().unwrap();
    assert_eq!(error.class_name, "app.LoadException");
    assert_eq!(error.message.as_deref(), Some("plugin failed"));
    assert_eq!(error.frames.len(), 2);
    let cause = error.cause.as_ref().unwrap();
    assert_eq!(cause.class_name, "app.io.MissingFileError");
    assert_eq!(cause.frames, vec!["at app.io.Files.open(Files.java:88)", "... 2 more"]);
    assert_eq!(error.root_cause().class_name, "app.io.MissingFileError");
    assert_eq!(records[1].level, LogLevel::Error);
}

#[test]
fn test_trace_at_end_of_output_is_released_by_flush() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();
    let plugin = Context::new("plugin");
    let _entered = plugin.enter();
    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();

    let mut err = bridge.stderr();
    err.write_all(b"app.BoomError: late\n\tat app.X.y(X.java:1)\n").unwrap();
    assert!(harness.backend.is_empty());
    err.flush().unwrap();
    assert_eq!(harness.backend.len(), 1);
    assert!(harness.backend.records()[0].error.is_some());
}

#[test]
fn test_stop_flushes_partial_line() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();
    let plugin = Context::new("plugin");
    let _entered = plugin.enter();
    bridge
        .start(LogLevel::Warn, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();

    write!(bridge.stdout(), "half a ").unwrap();
    write!(bridge.stdout(), "line").unwrap();
    assert!(harness.backend.is_empty());
    bridge.stop();

    assert_eq!(harness.messages_from("plugin.stdout"), vec!["half a line"]);
    writeln!(bridge.stdout(), "raw again").unwrap();
    assert_eq!(harness.out.contents_string(), "raw again\n");
}

#[test]
fn test_restore_original_gives_back_identical_channels() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();
    let out_before = harness.system.get(Channel::Out);
    let err_before = harness.system.get(Channel::Err);

    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    assert!(!same_channel(&harness.system.get(Channel::Out), &out_before));

    assert!(bridge.restore_original());
    assert!(same_channel(&harness.system.get(Channel::Out), &out_before));
    assert!(same_channel(&harness.system.get(Channel::Err), &err_before));
    assert!(!bridge.is_intercepting());

    // Restoring again only warns.
    assert!(!bridge.restore_original());

    // Starting again reinstalls over the same originals.
    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    writeln!(bridge.stdout(), "back").unwrap();
    assert_eq!(harness.messages_from("root.stdout"), vec!["back"]);
}

#[test]
fn test_second_start_does_not_reinstall() {
    let harness = common::Harness::new();
    let first = harness.bridge();
    let second = harness.bridge();

    first
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    let installed = harness.system.snapshot();

    {
        let plugin = Context::new("plugin");
        let _entered = plugin.enter();
        second
            .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
            .unwrap();
        first
            .start(LogLevel::Debug, LogLevel::Error, &StrategyKind::WriteToOriginal)
            .unwrap();
    }

    let now = harness.system.snapshot();
    assert!(same_channel(&now.out, &installed.out));
    assert!(same_channel(&now.err, &installed.err));

    let original = now.out.interception().unwrap().original();
    let expected: ChannelRef = harness.out.clone();
    assert!(same_channel(&original, &expected));
}

#[test]
fn test_restart_flushes_previous_appender() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();
    let plugin = Context::new("plugin");
    let _entered = plugin.enter();

    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    write!(bridge.stdout(), "pending").unwrap();
    bridge
        .start(LogLevel::Debug, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    writeln!(bridge.stdout(), "fresh").unwrap();

    let records = harness.backend.records();
    assert_eq!(records.len(), 2);
    assert_eq!((records[0].message.as_str(), records[0].level), ("pending", LogLevel::Info));
    assert_eq!((records[1].message.as_str(), records[1].level), ("fresh", LogLevel::Debug));
}

#[test]
fn test_read_only_scope_warns_and_installs_locally() {
    let harness = common::Harness::unpublished();
    let bridge = harness
        .builder()
        .scope(Arc::new(ReadOnlyScope::empty()))
        .degraded_scope(DegradedScopePolicy::Warn)
        .build();

    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    writeln!(bridge.stdout(), "still captured").unwrap();
    assert_eq!(harness.messages_from("root.stdout"), vec!["still captured"]);
    assert!(bridge.restore_original());
}

#[test]
fn test_read_only_scope_with_deny_policy_fails() {
    let harness = common::Harness::unpublished();
    let bridge = harness
        .builder()
        .scope(Arc::new(ReadOnlyScope::empty()))
        .degraded_scope(DegradedScopePolicy::Deny)
        .build();

    let err = bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::InstallationFailure(ScopeError::AccessDenied(_))
    ));
    assert!(!bridge.is_intercepting());

    writeln!(bridge.stdout(), "untouched").unwrap();
    assert_eq!(harness.out.contents_string(), "untouched\n");
}

#[test]
fn test_read_only_scope_reuses_visible_configurator() {
    let harness = common::Harness::new();
    let bridge = harness
        .builder()
        .scope(Arc::new(ReadOnlyScope::over(harness.scope.clone())))
        .degraded_scope(DegradedScopePolicy::Deny)
        .build();

    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    assert!(harness.registry.holds(Context::root().id()));
}

#[test]
fn test_foreign_interceptor_is_reported() {
    let out: ChannelRef = Arc::new(OpaqueInterceptor);
    let err: ChannelRef = Arc::new(OpaqueInterceptor);
    let harness = common::Harness::new();
    let bridge = harness
        .builder()
        .system(Arc::new(SystemOutput::new(out, err)))
        .build();

    let result = bridge.start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal);
    assert!(matches!(result, Err(BridgeError::ForeignInterceptor(Channel::Out))));
    assert!(!bridge.restore_original());
}

#[test]
fn test_failed_dispatch_keeps_output() {
    let harness = common::Harness::new();
    let bridge = harness.builder().backend(Arc::new(ClosedBackend)).build();

    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::Propagate)
        .unwrap();
    writeln!(bridge.stdout(), "must survive").unwrap();
    assert_eq!(harness.out.contents_string(), "must survive\n");
    bridge.stop();
    harness.out.clear();

    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    writeln!(bridge.stdout(), "also kept").unwrap();
    let written = harness.out.contents_string();
    assert!(written.contains("appender closed"));
    assert!(written.ends_with("also kept\n"));
    bridge.stop();
    harness.out.clear();

    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::Discard)
        .unwrap();
    writeln!(bridge.stdout(), "dropped").unwrap();
    assert!(harness.out.contents().is_empty());
}

#[test]
fn test_writer_follows_installed_channel() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();
    let mut out = bridge.stdout();

    writeln!(out, "before").unwrap();
    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    writeln!(out, "during").unwrap();
    bridge.stop();
    bridge.restore_original();
    writeln!(out, "after").unwrap();

    assert_eq!(harness.out.contents_string(), "before\nafter\n");
    assert_eq!(harness.messages_from("root.stdout"), vec!["during"]);
}

#[test]
fn test_bridges_with_fixed_contexts_share_the_installed_channels() {
    let harness = common::Harness::unpublished();
    let ctx_a = Context::new("a");
    let ctx_b = Context::new("b");
    let weak_a = ctx_a.downgrade();

    let backend_a = Arc::new(RecordingBackend::new());
    let backend_b = Arc::new(RecordingBackend::new());
    let a = harness
        .builder()
        .resolver(Arc::new(FixedContextResolver(ctx_a.clone())))
        .backend(backend_a.clone())
        .build();
    let b = harness
        .builder()
        .resolver(Arc::new(FixedContextResolver(ctx_b.clone())))
        .backend(backend_b.clone())
        .build();

    a.start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    b.start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();

    writeln!(b.stdout(), "from b").unwrap();
    writeln!(a.stdout(), "from a").unwrap();
    assert_eq!(backend_a.messages(), vec!["from a"]);
    assert_eq!(backend_b.messages(), vec!["from b"]);

    // Writes from a thread that entered no context are nobody's.
    writeln!(harness.system.writer(Channel::Out), "unowned").unwrap();
    assert_eq!(harness.out.contents_string(), "unowned\n");

    a.stop();
    drop(a);
    drop(ctx_a);
    assert!(!weak_a.is_alive());

    writeln!(b.stdout(), "still b").unwrap();
    assert_eq!(backend_b.messages(), vec!["from b", "still b"]);
}
