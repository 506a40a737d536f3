//! Underlying log writer shared by access-log sinks.
//!
//! # Responsibilities
//! - Own the output stream (file, stdout, stderr) for one output key
//! - Append whole lines atomically under a mutex
//! - Expose a lock-free disabled flag for runtime toggling
//! - Re-open files for external rotation

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::observability::metrics;

use super::buffer::PooledBuffer;

/// Output key writing to the process stdout.
pub const STDOUT: &str = "stdout";
/// Output key writing to the process stderr.
pub const STDERR: &str = "stderr";

enum LogWriter {
    Stdout,
    Stderr,
    File(BufWriter<File>),
}

impl LogWriter {
    fn open(output: &str) -> io::Result<Self> {
        match output {
            STDOUT => Ok(LogWriter::Stdout),
            STDERR => Ok(LogWriter::Stderr),
            path => {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(LogWriter::File(BufWriter::new(file)))
            }
        }
    }

    fn write_line(&mut self, line: &[u8], flush: bool) -> io::Result<()> {
        match self {
            LogWriter::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(line)?;
                if flush {
                    out.flush()?;
                }
            }
            LogWriter::Stderr => io::stderr().lock().write_all(line)?,
            LogWriter::File(file) => {
                file.write_all(line)?;
                if flush {
                    file.flush()?;
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::Stdout => io::stdout().flush(),
            LogWriter::Stderr => Ok(()),
            LogWriter::File(file) => file.flush(),
        }
    }
}

/// A writable log identified by its output key.
pub struct Logger {
    output: String,
    disabled: AtomicBool,
    writer: Mutex<LogWriter>,
}

impl Logger {
    /// Open the output, creating the file and parent directories if needed.
    pub fn open(output: &str) -> io::Result<Self> {
        let writer = LogWriter::open(output)?;
        tracing::debug!(output = %output, "Logger opened");
        Ok(Self {
            output: output.to_string(),
            disabled: AtomicBool::new(false),
            writer: Mutex::new(writer),
        })
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Set the disabled flag. Returns the previous value.
    pub fn toggle(&self, disabled: bool) -> bool {
        let previous = self.disabled.swap(disabled, Ordering::AcqRel);
        if previous != disabled {
            tracing::info!(output = %self.output, disabled, "Logger toggled");
        }
        previous
    }

    /// Append a rendered line. The buffer goes back to its pool afterwards.
    ///
    /// Write failures are reported and otherwise ignored.
    pub fn print(&self, buf: PooledBuffer, flush: bool) {
        let result = self.lock().write_line(buf.as_bytes(), flush);
        match result {
            Ok(()) => metrics::record_access_log_line(&self.output),
            Err(e) => {
                metrics::record_access_log_write_error(&self.output);
                tracing::error!(output = %self.output, error = %e, "Failed to write access log");
            }
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        self.lock().flush()
    }

    /// Flush and re-open the output, picking up a rotated file.
    pub fn reopen(&self) -> io::Result<()> {
        let mut writer = self.lock();
        if let Err(e) = writer.flush() {
            tracing::warn!(output = %self.output, error = %e, "Flush before reopen failed");
        }
        *writer = LogWriter::open(&self.output)?;
        tracing::info!(output = %self.output, "Logger re-opened");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, LogWriter> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("output", &self.output)
            .field("disabled", &self.is_disabled())
            .finish()
    }
}
