//! Sidecar access log runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──► loader ──► startup ──► AccessLogManager ──► Logger ──► files
//!        │                                   ▲        ▲
//!        ▼                                   │        │
//!   ConfigWatcher ──── apply_reload ─────────┘        │
//!                                                     │
//!   sidecar-cli ──► admin API (axum) ─────────────────┘
//!
//!   SIGHUP ──► reopen_all      SIGINT/SIGTERM ──► Shutdown ──► close_all
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use sidecar_proxy::accesslog::AccessLogManager;
use sidecar_proxy::admin::{setup_admin_router, AdminState};
use sidecar_proxy::config::{apply_reload, load_config, ConfigWatcher, SidecarConfig};
use sidecar_proxy::lifecycle::{handle_signals, initialize, Shutdown};
use sidecar_proxy::observability::{init_logging, init_metrics};

const CONFIG_ENV: &str = "SIDECAR_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => SidecarConfig::default(),
    };

    init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "sidecar-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let manager = AccessLogManager::global();
    initialize(&manager, &config)?;

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let app = setup_admin_router(AdminState::new(manager.clone(), &config.admin.api_key));
        let stop = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.wait().await })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    // dropping the watcher stops file events
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let manager = manager.clone();
            let mut stopped = shutdown.subscribe();
            let mut current = config.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        update = updates.recv() => match update {
                            Some(new) => {
                                apply_reload(&manager, &current, &new);
                                current = new;
                            }
                            None => break,
                        },
                        _ = stopped.recv() => break,
                    }
                }
            }));
            Some(watcher)
        }
        None => None,
    };

    if let Err(e) = handle_signals(manager.clone(), shutdown.clone()).await {
        tracing::error!(error = %e, "Signal handling failed");
        shutdown.trigger();
    }

    for task in tasks {
        let _ = task.await;
    }

    manager.close_all();
    tracing::info!("Shutdown complete");
    Ok(())
}
