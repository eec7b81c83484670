//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!("Config file change detected, reloading...");
                    match load_config(&path) {
                        Ok(new_config) => {
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Failed to reload config. Keeping current configuration."
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Apply reloaded configurations to the shared config until shutdown.
///
/// Listener address, storage path and the reserved prefix are read once at
/// startup; changing them is logged and otherwise ignored.
pub async fn apply_updates(
    config: Arc<ArcSwap<ProxyConfig>>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(new_config) = update else { break };
                let current = config.load();
                if current.listener.bind_address != new_config.listener.bind_address
                    || current.storage.path != new_config.storage.path
                    || current.disraptor.reserved_prefix != new_config.disraptor.reserved_prefix
                {
                    tracing::warn!("Some changed settings only take effect after a restart");
                }
                tracing::info!(
                    enabled = new_config.disraptor.enabled,
                    read_timeout_secs = new_config.disraptor.read_timeout_secs,
                    "Configuration reloaded"
                );
                config.store(Arc::new(new_config));
            }
            _ = shutdown.recv() => break,
        }
    }
}
