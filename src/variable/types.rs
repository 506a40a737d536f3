//! Variable definitions, per-request value slots and error types.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::context::RequestContext;

/// Rendered in place of a variable whose getter reported absence.
pub const VALUE_NOT_FOUND: &str = "-";

/// Indexed variable re-evaluates on every read instead of using its slot.
pub const FLAG_NOCACHEABLE: u32 = 0x1;

/// Errors raised while registering or evaluating variables.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariableError {
    #[error("duplicate variable register, name: {0}")]
    DuplicateName(String),

    #[error("duplicate prefix variable register, prefix: {0}")]
    DuplicatePrefix(String),

    #[error("undefined variable, name: {0}")]
    UndefinedVariable(String),

    #[error("no variables found in context")]
    NoVariablesInContext,

    #[error("getter function undefined, variable name: {0}")]
    GetterNotFound(String),

    #[error("setter function undefined, variable name: {0}")]
    SetterNotFound(String),

    /// A collaborator value (request info, header map) is not attached.
    #[error("context value missing: {0}")]
    MissingContextValue(&'static str),
}

/// Reads a variable's value for a request.
///
/// Receives the request context and the variable's construction data.
/// `Ok(None)` means the value does not exist for this request.
pub type Getter = Arc<
    dyn Fn(&RequestContext, Option<&str>) -> Result<Option<String>, VariableError> + Send + Sync,
>;

/// Writes a variable's value for a request.
///
/// The slot is present when the variable is indexed and the context carries
/// a slot for it.
pub type Setter = Arc<
    dyn Fn(
            &RequestContext,
            Option<&mut IndexedValue>,
            Option<&str>,
            &str,
        ) -> Result<(), VariableError>
        + Send
        + Sync,
>;

/// Whether a variable owns a slot in the per-request value vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Getter runs on every read.
    Basic,
    /// Assigned a stable index at registration; reads are memoised.
    Indexed,
}

/// A named accessor returning a string attribute of the current request.
#[derive(Clone)]
pub struct Variable {
    name: String,
    data: Option<String>,
    flags: u32,
    kind: VariableKind,
    index: Option<u32>,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Variable {
    /// Create a variable whose getter is re-evaluated on every read.
    pub fn new_basic<G>(name: impl Into<String>, getter: G) -> Self
    where
        G: Fn(&RequestContext, Option<&str>) -> Result<Option<String>, VariableError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_kind(name, VariableKind::Basic, Some(Arc::new(getter)))
    }

    /// Create a variable that is assigned an index when registered.
    pub fn new_indexed<G>(name: impl Into<String>, getter: G) -> Self
    where
        G: Fn(&RequestContext, Option<&str>) -> Result<Option<String>, VariableError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_kind(name, VariableKind::Indexed, Some(Arc::new(getter)))
    }

    /// Create a variable without a getter, typically write-only.
    pub fn without_getter(name: impl Into<String>, kind: VariableKind) -> Self {
        Self::with_kind(name, kind, None)
    }

    fn with_kind(name: impl Into<String>, kind: VariableKind, getter: Option<Getter>) -> Self {
        Self {
            name: name.into(),
            data: None,
            flags: 0,
            kind,
            index: None,
            getter,
            setter: None,
        }
    }

    /// Concrete indexed variable minted from a prefix family for `name`.
    pub(crate) fn promoted(name: &str, prefix: &Variable) -> Self {
        Self {
            name: name.to_string(),
            data: Some(name.to_string()),
            flags: prefix.flags,
            kind: VariableKind::Indexed,
            index: None,
            getter: prefix.getter.clone(),
            setter: prefix.setter.clone(),
        }
    }

    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(
                &RequestContext,
                Option<&mut IndexedValue>,
                Option<&str>,
                &str,
            ) -> Result<(), VariableError>
            + Send
            + Sync
            + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Slot index; `None` until an indexed variable is registered.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: u32) {
        self.index = Some(index);
    }

    pub fn getter(&self) -> Option<&Getter> {
        self.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Setter> {
        self.setter.as_ref()
    }

    pub fn is_cacheable(&self) -> bool {
        self.flags & FLAG_NOCACHEABLE == 0
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("flags", &self.flags)
            .field("kind", &self.kind)
            .field("index", &self.index)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// Per-request value slot of an indexed variable.
///
/// At most one of `valid` and `not_found` is set; both unset means the
/// variable has not been evaluated for this request yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedValue {
    pub value: String,
    pub valid: bool,
    pub not_found: bool,
}

impl IndexedValue {
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.valid = true;
        self.not_found = false;
    }

    pub fn set_not_found(&mut self) {
        self.value.clear();
        self.valid = false;
        self.not_found = true;
    }

    pub fn is_evaluated(&self) -> bool {
        self.valid || self.not_found
    }

    /// Cached rendering: the value, the sentinel, or `None` if unevaluated.
    pub fn rendered(&self) -> Option<String> {
        if self.valid {
            Some(self.value.clone())
        } else if self.not_found {
            Some(VALUE_NOT_FOUND.to_string())
        } else {
            None
        }
    }
}

/// Setter that stores the new value in the variable's slot.
pub fn basic_setter(
    _ctx: &RequestContext,
    slot: Option<&mut IndexedValue>,
    _data: Option<&str>,
    value: &str,
) -> Result<(), VariableError> {
    match slot {
        Some(slot) => {
            slot.set(value);
            Ok(())
        }
        None => Err(VariableError::NoVariablesInContext),
    }
}
