//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Trigger shutdown or access log re-open
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP re-opens log files for external rotation, not shutdown

use std::sync::Arc;

use crate::accesslog::AccessLogManager;

use super::Shutdown;

/// Run until SIGINT or SIGTERM, re-opening access logs on SIGHUP.
///
/// Triggers `shutdown` before returning.
#[cfg(unix)]
pub async fn handle_signals(
    manager: Arc<AccessLogManager>,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut stopped = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                let failures = manager.reopen_all();
                tracing::info!(failures, "SIGHUP received, access logs re-opened");
            }
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received");
                break;
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("SIGINT received");
                break;
            }
            _ = stopped.recv() => return Ok(()),
        }
    }

    shutdown.trigger();
    Ok(())
}

#[cfg(not(unix))]
pub async fn handle_signals(
    _manager: Arc<AccessLogManager>,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let mut stopped = shutdown.subscribe();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Ctrl-C received");
        }
        _ = stopped.recv() => return Ok(()),
    }
    shutdown.trigger();
    Ok(())
}
