//! stdio-bridge demo.
//!
//! Starts the bridge for a plugin context and the root context, writes
//! plain lines and a printed stack trace, then stops and restores the
//! original channels. With `--watch`, keeps capturing and re-applies the
//! capture section whenever the config file changes.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use stdio_bridge::bridge::strategy_factory;
use stdio_bridge::config::{load_config, ConfigWatcher};
use stdio_bridge::observability::logging::init_logging;
use stdio_bridge::{
    BridgeConfig, Context, LogBackend, LogLevel, RecordingBackend, StdioBridge, TracingBackend,
};

#[derive(Parser)]
#[command(name = "stdio-bridge-demo")]
#[command(about = "Send stdout and stderr of a context to structured logging", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Level for captured stdout lines (overrides config)
    #[arg(long, value_enum)]
    out_level: Option<LogLevel>,

    /// Level for captured stderr lines (overrides config)
    #[arg(long, value_enum)]
    err_level: Option<LogLevel>,

    /// Emit the bridge's own logs as JSON
    #[arg(long)]
    json: bool,

    /// Collect records in memory and print them as JSON at the end
    #[arg(long)]
    record: bool,

    /// Keep capturing and apply config file changes until Ctrl-C
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(level) = cli.out_level {
        config.capture.out_level = level;
    }
    if let Some(level) = cli.err_level {
        config.capture.err_level = level;
    }
    config.observability.json |= cli.json;

    init_logging(&config.observability);
    tracing::info!(
        out_level = %config.capture.out_level,
        err_level = %config.capture.err_level,
        "stdio-bridge demo starting"
    );

    let recorder = Arc::new(RecordingBackend::new());
    let backend: Arc<dyn LogBackend> = if cli.record {
        recorder.clone()
    } else {
        Arc::new(TracingBackend)
    };
    let bridge = StdioBridge::builder_from_config(&config).backend(backend).build();

    run_plugin(&bridge, &config)?;

    bridge.start_with(&config.capture)?;
    writeln!(bridge.stdout(), "root context output is logged too")?;

    if cli.watch {
        if let Some(path) = &cli.config {
            watch(&bridge, path, &config).await?;
        }
    }

    bridge.stop();
    bridge.restore_original();
    writeln!(bridge.stdout(), "stdout is a plain channel again")?;

    if cli.record {
        for record in recorder.records() {
            println!("{}", serde_json::to_string(&record)?);
        }
    }
    Ok(())
}

fn run_plugin(bridge: &StdioBridge, config: &BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let plugin = Context::new("plugin");
    let _entered = plugin.enter();

    bridge.start(
        config.capture.out_level,
        config.capture.err_level,
        &strategy_factory(&config.capture),
    )?;

    let mut out = bridge.stdout();
    let mut err = bridge.stderr();
    writeln!(out, "plugin loaded")?;
    write!(out, "no newline yet")?;
    writeln!(err, "demo.PluginException: could not open resource")?;
    writeln!(err, "\tat demo.Plugin.open(Plugin.java:42)")?;
    writeln!(err, "Caused by: demo.ResourceError: file not found")?;
    writeln!(err, "\tat demo.Files.read(Files.java:7)")?;
    writeln!(err, "after the trace")?;

    bridge.stop();
    Ok(())
}

async fn watch(
    bridge: &StdioBridge,
    path: &std::path::Path,
    config: &BridgeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, mut updates) = ConfigWatcher::new(path, config);
    let _watcher = watcher.run()?;

    loop {
        tokio::select! {
            Some(updated) = updates.recv() => {
                bridge.start_with(&updated.capture)?;
                writeln!(bridge.stdout(), "capture settings reloaded")?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, stopping capture");
                break;
            }
        }
    }
    Ok(())
}
