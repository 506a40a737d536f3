//! Startup orchestration.
//!
//! # Responsibilities
//! - Register the built-in variables
//! - Build access log sinks from configuration
//! - Apply the configured disable flags
//!
//! # Design Decisions
//! - Fail fast: a bad format or unopenable output is fatal
//! - Default-disable is applied before sinks are created, so no line is
//!   written by a sink that is meant to start disabled

use std::sync::Arc;

use thiserror::Error;

use crate::accesslog::{AccessLog, AccessLogError, AccessLogManager};
use crate::config::SidecarConfig;
use crate::variable::{register_builtin_variables, VariableError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to register built-in variables: {0}")]
    Variables(#[from] VariableError),

    #[error("access log #{index} ({output}): {source}")]
    AccessLog {
        index: usize,
        output: String,
        #[source]
        source: AccessLogError,
    },
}

/// Register variables and create every configured access log.
pub fn initialize(
    manager: &AccessLogManager,
    config: &SidecarConfig,
) -> Result<Vec<Arc<AccessLog>>, StartupError> {
    register_builtin_variables(manager.registry())?;

    if config.disable_access_log {
        manager.disable_all();
    }

    let mut logs = Vec::with_capacity(config.access_logs.len());
    for (index, log_config) in config.access_logs.iter().enumerate() {
        let log = manager
            .new_access_log(&log_config.output, &log_config.format)
            .map_err(|source| StartupError::AccessLog {
                index,
                output: log_config.output.clone(),
                source,
            })?;
        if log_config.disabled {
            log.toggle(true);
        }
        logs.push(log);
    }

    tracing::info!(
        access_logs = logs.len(),
        variables = manager.registry().variable_names().len(),
        default_disabled = manager.is_default_disabled(),
        "Startup complete"
    );
    Ok(logs)
}
