//! Process-wide access log management.
//!
//! # Responsibilities
//! - Create sinks and share loggers between sinks with the same output
//! - Track every sink for fleet-wide disable
//! - Toggle, re-open and close loggers by output key
//!
//! # Design Decisions
//! - The default-disable flag is read and written under the sink list
//!   mutex, so a sink created concurrently with `disable_all` is never
//!   left enabled
//! - Loggers live in a `DashMap` keyed by output; toggles never touch the
//!   sink list

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::observability::metrics;
use crate::variable::VariableRegistry;

use super::buffer::BufferPool;
use super::format::parse_format;
use super::logger::Logger;
use super::sink::AccessLog;
use super::AccessLogError;

/// Owner of all access-log sinks and their loggers.
pub struct AccessLogManager {
    registry: Arc<VariableRegistry>,
    loggers: DashMap<String, Arc<Logger>>,
    logs: Mutex<Vec<Arc<AccessLog>>>,
    default_disabled: AtomicBool,
    pool: Arc<BufferPool>,
}

static GLOBAL_MANAGER: OnceLock<Arc<AccessLogManager>> = OnceLock::new();

impl AccessLogManager {
    /// Create a manager resolving format variables through `registry`.
    pub fn new(registry: Arc<VariableRegistry>) -> Self {
        Self {
            registry,
            loggers: DashMap::new(),
            logs: Mutex::new(Vec::new()),
            default_disabled: AtomicBool::new(false),
            pool: Arc::new(BufferPool::default()),
        }
    }

    /// The process-wide manager, bound to the global variable registry.
    pub fn global() -> Arc<AccessLogManager> {
        GLOBAL_MANAGER
            .get_or_init(|| Arc::new(AccessLogManager::new(VariableRegistry::global())))
            .clone()
    }

    pub fn registry(&self) -> &Arc<VariableRegistry> {
        &self.registry
    }

    /// Compile `format` and create a sink writing to `output`.
    ///
    /// Sinks created while default-disable is set start disabled.
    pub fn new_access_log(
        &self,
        output: &str,
        format: &str,
    ) -> Result<Arc<AccessLog>, AccessLogError> {
        let entries = parse_format(&self.registry, format)?;
        let logger = self.get_or_create_logger(output)?;
        let log = Arc::new(AccessLog::new(output, format, entries, logger, self.pool.clone()));

        let mut logs = self.logs();
        if self.default_disabled.load(Ordering::Acquire) {
            log.toggle(true);
        }
        logs.push(log.clone());
        metrics::record_access_log_sinks(logs.len());

        tracing::info!(
            output = %output,
            entries = log.entries().len(),
            disabled = log.is_disabled(),
            "Access log created"
        );
        Ok(log)
    }

    /// Logger for `output`, opened on first use.
    pub fn get_or_create_logger(&self, output: &str) -> Result<Arc<Logger>, AccessLogError> {
        if let Some(logger) = self.loggers.get(output) {
            return Ok(logger.clone());
        }

        match self.loggers.entry(output.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let logger = Logger::open(output).map_err(|source| AccessLogError::Io {
                    output: output.to_string(),
                    source,
                })?;
                let logger = Arc::new(logger);
                entry.insert(logger.clone());
                Ok(logger)
            }
        }
    }

    /// Disable every registered sink and make later sinks start disabled.
    pub fn disable_all(&self) {
        let logs = self.logs();
        self.default_disabled.store(true, Ordering::Release);
        for log in logs.iter() {
            log.toggle(true);
        }
        tracing::info!(sinks = logs.len(), "All access logs disabled");
    }

    /// Set the default-disable flag; `true` also disables every sink.
    ///
    /// Clearing the flag does not re-enable sinks that are already off.
    pub fn set_default_disabled(&self, disabled: bool) {
        if disabled {
            self.disable_all();
        } else {
            let _logs = self.logs();
            self.default_disabled.store(false, Ordering::Release);
        }
    }

    pub fn is_default_disabled(&self) -> bool {
        self.default_disabled.load(Ordering::Acquire)
    }

    /// Set the disabled flag of the logger for `output`.
    ///
    /// Returns false if no logger exists for that output.
    pub fn toggle_logger(&self, output: &str, disabled: bool) -> bool {
        match self.loggers.get(output) {
            Some(logger) => {
                logger.toggle(disabled);
                true
            }
            None => {
                tracing::debug!(output = %output, "Toggle requested for unknown logger");
                false
            }
        }
    }

    /// Snapshot of every registered sink in creation order.
    pub fn access_logs(&self) -> Vec<Arc<AccessLog>> {
        self.logs().clone()
    }

    /// `(output, disabled)` for every logger, sorted by output.
    pub fn logger_states(&self) -> Vec<(String, bool)> {
        let mut states: Vec<(String, bool)> = self
            .loggers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().is_disabled()))
            .collect();
        states.sort();
        states
    }

    /// Re-open every logger. Returns the number that failed.
    pub fn reopen_all(&self) -> usize {
        let mut failures = 0;
        for entry in self.loggers.iter() {
            if let Err(e) = entry.value().reopen() {
                failures += 1;
                tracing::error!(output = %entry.key(), error = %e, "Failed to re-open logger");
            }
        }
        failures
    }

    /// Flush and drop every logger and sink.
    pub fn close_all(&self) {
        let mut logs = self.logs();
        for entry in self.loggers.iter() {
            if let Err(e) = entry.value().flush() {
                tracing::warn!(output = %entry.key(), error = %e, "Failed to flush logger");
            }
        }
        self.loggers.clear();
        logs.clear();
        metrics::record_access_log_sinks(0);
        tracing::info!("All access logs closed");
    }

    fn logs(&self) -> MutexGuard<'_, Vec<Arc<AccessLog>>> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AccessLogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLogManager")
            .field("loggers", &self.loggers.len())
            .field("default_disabled", &self.is_default_disabled())
            .finish()
    }
}
