//! Access log format compiler.
//!
//! # Grammar
//! ```text
//! format  := (literal | var)*
//! literal := characters up to the next unescaped '%'
//! var     := '%' name '%'
//! escape  := '\%' → '%'
//! ```
//!
//! # Design Decisions
//! - Single left-to-right pass; each unescaped '%' flips the parser state
//! - Variable names resolve through `add_variable`, which may promote a
//!   prefix family member into an indexed variable
//! - Empty literal spans are not emitted

use std::sync::Arc;

use crate::variable::{Variable, VariableRegistry};

use super::AccessLogError;

/// A compiled piece of an access log format.
#[derive(Debug, Clone)]
pub enum LogEntry {
    /// Text copied verbatim.
    Literal(String),
    /// Variable rendered per request.
    Var(Arc<Variable>),
}

impl LogEntry {
    pub fn is_literal(&self) -> bool {
        matches!(self, LogEntry::Literal(_))
    }
}

/// Compile `format` into an ordered list of entries.
pub fn parse_format(
    registry: &VariableRegistry,
    format: &str,
) -> Result<Vec<LogEntry>, AccessLogError> {
    if format.is_empty() {
        return Err(AccessLogError::FormatUndefined);
    }

    let mut entries = Vec::with_capacity(8);
    let mut in_var = false;
    let mut current = String::new();
    let mut chars = format.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'%') => {
                chars.next();
                current.push('%');
            }
            '%' if in_var => {
                if current.is_empty() {
                    return Err(AccessLogError::EmptyVarDef);
                }
                let variable = registry.add_variable(&current)?;
                entries.push(LogEntry::Var(variable));
                current.clear();
                in_var = false;
            }
            '%' => {
                if !current.is_empty() {
                    entries.push(LogEntry::Literal(std::mem::take(&mut current)));
                }
                in_var = true;
            }
            _ => current.push(ch),
        }
    }

    if in_var {
        return Err(AccessLogError::UnclosedVarDef);
    }
    if !current.is_empty() {
        entries.push(LogEntry::Literal(current));
    }

    Ok(entries)
}
