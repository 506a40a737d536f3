//! Configuration file watcher for hot reload.
//!
//! Only access log toggles are applied live. Sinks keep their output and
//! format until restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::accesslog::AccessLogManager;
use crate::config::loader::load_config;
use crate::config::schema::SidecarConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<SidecarConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<SidecarConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "Failed to reload config, keeping current configuration"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Apply the toggles of a reloaded config to live sinks.
///
/// Clearing `disable_access_log` restores every unchanged sink to its
/// configured `disabled` value. While it is set, sinks are never enabled.
///
/// Returns the number of sinks whose output or format changed and were
/// left as they are.
pub fn apply_reload(
    manager: &AccessLogManager,
    current: &SidecarConfig,
    new: &SidecarConfig,
) -> usize {
    if new.disable_access_log != current.disable_access_log {
        manager.set_default_disabled(new.disable_access_log);
    }
    let restore = current.disable_access_log && !new.disable_access_log;

    let mut ignored = 0;
    for (i, log) in new.access_logs.iter().enumerate() {
        match current.access_logs.get(i) {
            Some(old) if old.output == log.output && old.format == log.format => {
                let changed = restore || old.disabled != log.disabled;
                if changed && (log.disabled || !new.disable_access_log) {
                    manager.toggle_logger(&log.output, log.disabled);
                }
            }
            _ => {
                ignored += 1;
                tracing::warn!(
                    output = %log.output,
                    "Access log output or format changed; restart required"
                );
            }
        }
    }
    if current.access_logs.len() > new.access_logs.len() {
        ignored += current.access_logs.len() - new.access_logs.len();
        tracing::warn!("Access logs removed from config stay active until restart");
    }
    ignored
}
