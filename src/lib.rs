//! Sidecar dynamic variables and access logging.
//!
//! Per-request variables are resolved through a [`variable::VariableRegistry`]
//! and rendered into access log lines by [`accesslog::AccessLog`] sinks.

pub mod accesslog;
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod request_info;
pub mod variable;

pub use accesslog::{AccessLog, AccessLogError, AccessLogManager};
pub use config::SidecarConfig;
pub use lifecycle::Shutdown;
pub use request_info::{RequestInfo, StreamRequestInfo};
pub use variable::{RequestContext, Variable, VariableError, VariableRegistry};
