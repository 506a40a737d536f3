//! Dynamic variable subsystem.
//!
//! # Data Flow
//! ```text
//! warm-up:
//!     builtin.rs → registry.rs (register indexed variables + prefix families)
//!
//! per request:
//!     VariableRegistry::new_variable_context
//!         → RequestContext (slot vector sized to indexed count)
//!         → get_variable_value / set_variable_value
//!         → getter (stringified value) → slot (memoised)
//! ```
//!
//! # Design Decisions
//! - Every value is a string; getters stringify structured data
//! - Indexed variables memoise per request; basic ones re-evaluate
//! - Absence is reported by getters as `None` and rendered as "-"

pub mod builtin;
pub mod context;
pub mod registry;
pub mod types;

pub use builtin::register_builtin_variables;
pub use context::RequestContext;
pub use registry::{evaluate, VariableRegistry};
pub use types::{
    basic_setter, Getter, IndexedValue, Setter, Variable, VariableError, VariableKind,
    FLAG_NOCACHEABLE, VALUE_NOT_FOUND,
};
