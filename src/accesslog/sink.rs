//! Access-log sink: a compiled format bound to a logger.

use std::sync::Arc;

use crate::observability::metrics;
use crate::variable::{evaluate, RequestContext, VALUE_NOT_FOUND};

use super::buffer::{BufferPool, PooledBuffer};
use super::format::LogEntry;
use super::logger::Logger;

/// An access-log output bound to a compiled format.
#[derive(Debug)]
pub struct AccessLog {
    output: String,
    format: String,
    entries: Vec<LogEntry>,
    logger: Arc<Logger>,
    pool: Arc<BufferPool>,
}

impl AccessLog {
    pub(crate) fn new(
        output: &str,
        format: &str,
        entries: Vec<LogEntry>,
        logger: Arc<Logger>,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            output: output.to_string(),
            format: format.to_string(),
            entries,
            logger,
            pool,
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn is_disabled(&self) -> bool {
        self.logger.is_disabled()
    }

    /// Set the underlying logger's disabled flag.
    pub fn toggle(&self, disabled: bool) {
        self.logger.toggle(disabled);
    }

    /// Render one line for the request and hand it to the logger.
    ///
    /// Does nothing while the logger is disabled. Variables that fail to
    /// evaluate are written as "-".
    pub fn log(&self, ctx: &RequestContext) {
        if self.logger.is_disabled() {
            metrics::record_access_log_dropped(&self.output);
            return;
        }

        let mut buf = self.pool.get();
        for entry in &self.entries {
            match entry {
                LogEntry::Literal(text) => buf.write_str(text),
                LogEntry::Var(variable) => match evaluate(ctx, variable) {
                    Ok(value) => write_value(&mut buf, &value),
                    Err(e) => {
                        metrics::record_variable_error(variable.name());
                        tracing::warn!(
                            output = %self.output,
                            variable = %variable.name(),
                            error = %e,
                            "Access log variable evaluation failed"
                        );
                        buf.write_str(VALUE_NOT_FOUND);
                    }
                },
            }
        }
        buf.push(b'\n');
        self.logger.print(buf, true);
    }
}

// Line breaks inside values would split the record.
fn write_value(buf: &mut PooledBuffer, value: &str) {
    if !value.contains(&['\n', '\r'][..]) {
        buf.write_str(value);
        return;
    }
    for ch in value.chars() {
        match ch {
            '\n' => buf.write_str("\\n"),
            '\r' => buf.write_str("\\r"),
            _ => {
                let mut utf8 = [0u8; 4];
                buf.write_str(ch.encode_utf8(&mut utf8));
            }
        }
    }
}
