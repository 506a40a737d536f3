//! Access logging.
//!
//! # Responsibilities
//! - Compile `%name%` format strings into literal and variable entries
//! - Render one line per request through the variable registry
//! - Share one writer per output between sinks
//! - Runtime toggling and fleet-wide disable
//!
//! # Data Flow
//! ```text
//! format ──► parse_format ──► [LogEntry] ──┐
//!                                          ▼
//! RequestContext ──► AccessLog::log ──► PooledBuffer ──► Logger ──► file
//! ```

pub mod buffer;
pub mod format;
pub mod logger;
pub mod manager;
pub mod sink;

use std::io;

use thiserror::Error;

use crate::variable::VariableError;

pub use buffer::{BufferPool, PooledBuffer, ACCESS_LOG_LEN};
pub use format::{parse_format, LogEntry};
pub use logger::{Logger, STDERR, STDOUT};
pub use manager::AccessLogManager;
pub use sink::AccessLog;

/// Access log construction errors.
#[derive(Debug, Error)]
pub enum AccessLogError {
    #[error("access log format undefined")]
    FormatUndefined,

    #[error("access log format error: empty variable definition")]
    EmptyVarDef,

    #[error("access log format error: unclosed variable definition")]
    UnclosedVarDef,

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("failed to open access log output {output}: {source}")]
    Io {
        output: String,
        #[source]
        source: io::Error,
    },
}
