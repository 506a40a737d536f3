//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Register variables → Build access logs → Apply toggles
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Notify tasks → Close access logs → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Re-open access log files
//! ```
//!
//! # Design Decisions
//! - Ordered startup: variables are registered before any format compiles
//! - Access logs are closed after every task has stopped

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::handle_signals;
pub use startup::{initialize, StartupError};
