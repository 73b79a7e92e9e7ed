//! Configuration file watcher for live capture changes.
//!
//! Only the `[capture]` section can be applied to a running bridge, so a
//! reload is forwarded only when that section actually changed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{BridgeConfig, CaptureConfig};

/// Watches a configuration file and delivers changed configurations.
pub struct ConfigWatcher {
    path: PathBuf,
    last_capture: Arc<Mutex<CaptureConfig>>,
    update_tx: mpsc::UnboundedSender<BridgeConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration already applied; reloads equal to it
    /// in the capture section are dropped.
    pub fn new(path: &Path, current: &BridgeConfig) -> (Self, mpsc::UnboundedReceiver<BridgeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            last_capture: Arc::new(Mutex::new(current.capture.clone())),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Reload the file and forward it if the capture section changed.
    /// Returns whether an update was sent.
    pub fn reload(&self) -> bool {
        reload_into(&self.path, &self.last_capture, &self.update_tx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let last_capture = Arc::clone(&self.last_capture);
        let tx = self.update_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    reload_into(&path, &last_capture, &tx);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn reload_into(
    path: &Path,
    last_capture: &Mutex<CaptureConfig>,
    tx: &mpsc::UnboundedSender<BridgeConfig>,
) -> bool {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current capture settings");
            return false;
        }
    };

    let mut last = last_capture.lock().unwrap_or_else(PoisonError::into_inner);
    if *last == config.capture {
        tracing::debug!("Config file changed outside the capture section, ignoring");
        return false;
    }
    *last = config.capture.clone();
    drop(last);

    tracing::info!(
        out_level = %config.capture.out_level,
        err_level = %config.capture.err_level,
        "Capture settings changed"
    );
    tx.send(config).is_ok()
}
