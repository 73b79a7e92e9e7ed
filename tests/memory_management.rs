//! Discarded contexts must not be kept alive by the bridge.

use std::io::Write;
use std::sync::Arc;

use stdio_bridge::appender::LogLevel;
use stdio_bridge::channel::{Channel, OutputChannel};
use stdio_bridge::context::Context;
use stdio_bridge::exceptions::StrategyKind;

mod common;

#[test]
fn test_context_without_stop_is_collected() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();

    let plugin = Context::new("plugin");
    let weak = plugin.downgrade();
    let id = plugin.id();
    {
        let _entered = plugin.enter();
        bridge
            .start(LogLevel::Info, LogLevel::Warn, &StrategyKind::WriteToOriginal)
            .unwrap();
        writeln!(bridge.stdout(), "loaded").unwrap();
        write!(bridge.stderr(), "dangling partial").unwrap();
    }
    assert!(harness.registry.holds(id));
    assert_eq!(plugin.pinned_count(), 2);

    // The host unloads the plugin without ever calling stop.
    drop(plugin);

    assert!(!weak.is_alive());
    assert!(weak.upgrade().is_none());
    assert_eq!(harness.registry.purge(), 2);
    assert!(!harness.registry.holds(id));
    assert!(harness.registry.is_empty());
    assert_eq!(harness.messages_from("plugin.stdout"), vec!["loaded"]);
    assert_eq!(harness.messages_from("plugin.stderr"), vec!["dangling partial"]);
}

#[test]
fn test_held_text_is_logged_when_context_is_dropped() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();

    let plugin = Context::new("plugin");
    {
        let _entered = plugin.enter();
        bridge
            .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
            .unwrap();
        writeln!(bridge.stdout(), "app.ConfigError: file not found").unwrap();

        let worker = plugin.clone();
        let out = bridge.stdout();
        std::thread::spawn(move || {
            let _entered = worker.enter();
            let mut out = out;
            write!(out, "x.BoomError: bad\n\tat a.b(c)\n").unwrap();
        })
        .join()
        .unwrap();
    }
    // The worker's trace is released when its thread exits.
    assert_eq!(harness.messages_from("plugin.stdout"), vec!["x.BoomError: bad"]);

    drop(plugin);
    assert_eq!(
        harness.messages_from("plugin.stdout"),
        vec!["x.BoomError: bad", "app.ConfigError: file not found"]
    );
    assert!(harness.out.contents().is_empty());
}

#[test]
fn test_channels_do_not_retain_discarded_context() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();

    let weak = {
        let plugin = Context::new("short-lived");
        let _entered = plugin.enter();
        bridge
            .start(LogLevel::Debug, LogLevel::Error, &StrategyKind::Discard)
            .unwrap();
        writeln!(bridge.stdout(), "hello").unwrap();
        plugin.downgrade()
    };
    assert!(!weak.is_alive());

    // The channels stay installed and keep working for everyone else.
    assert!(harness.system.is_intercepting());
    writeln!(bridge.stdout(), "from root").unwrap();
    assert_eq!(harness.out.contents_string(), "from root\n");
}

#[test]
fn test_registry_stays_bounded_under_churn() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();

    for i in 0..100 {
        let plugin = Context::new(format!("plugin-{i}"));
        let _entered = plugin.enter();
        bridge
            .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
            .unwrap();
        writeln!(bridge.stdout(), "line {i}").unwrap();
    }

    // Every put sweeps dead entries, so at most the last context's two remain.
    assert!(harness.registry.len() <= 2);
    harness.registry.purge();
    assert!(harness.registry.is_empty());
    assert_eq!(harness.backend.len(), 100);
}

#[test]
fn test_stop_releases_appenders_immediately() {
    let harness = common::Harness::new();
    let bridge = harness.bridge();
    let plugin = Context::new("plugin");

    let _entered = plugin.enter();
    bridge
        .start(LogLevel::Info, LogLevel::Error, &StrategyKind::WriteToOriginal)
        .unwrap();
    assert_eq!(plugin.pinned_count(), 2);

    bridge.stop();
    assert_eq!(plugin.pinned_count(), 0);
    assert!(harness.registry.is_empty());

    let system = Arc::clone(&harness.system);
    assert!(system.get(Channel::Out).interception().is_some());
}
