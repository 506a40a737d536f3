//! Request context carrying collaborator values and the slot vector.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::request_info::{HeaderMap, RequestInfo};

use super::types::{IndexedValue, VariableError};

/// Per-request state visible to variable getters.
///
/// A context becomes variable-enabled once a slot vector is attached by
/// [`VariableRegistry::new_variable_context`](super::VariableRegistry::new_variable_context).
/// It is owned by one request; the slot vector sits behind a mutex only so
/// that sinks can render through `&RequestContext`.
#[derive(Default)]
pub struct RequestContext {
    request_info: Option<Arc<dyn RequestInfo>>,
    request_headers: Option<Arc<dyn HeaderMap>>,
    response_headers: Option<Arc<dyn HeaderMap>>,
    values: Option<Mutex<Vec<IndexedValue>>>,
}

impl RequestContext {
    /// Create an empty context without a slot vector.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_info(mut self, info: Arc<dyn RequestInfo>) -> Self {
        self.request_info = Some(info);
        self
    }

    pub fn with_request_headers(mut self, headers: Arc<dyn HeaderMap>) -> Self {
        self.request_headers = Some(headers);
        self
    }

    pub fn with_response_headers(mut self, headers: Arc<dyn HeaderMap>) -> Self {
        self.response_headers = Some(headers);
        self
    }

    pub(crate) fn with_slots(mut self, count: usize) -> Self {
        self.values = Some(Mutex::new(vec![IndexedValue::default(); count]));
        self
    }

    pub fn request_info(&self) -> Result<&dyn RequestInfo, VariableError> {
        self.request_info
            .as_deref()
            .ok_or(VariableError::MissingContextValue("request_info"))
    }

    pub fn request_headers(&self) -> Result<&dyn HeaderMap, VariableError> {
        self.request_headers
            .as_deref()
            .ok_or(VariableError::MissingContextValue("request_headers"))
    }

    pub fn response_headers(&self) -> Result<&dyn HeaderMap, VariableError> {
        self.response_headers
            .as_deref()
            .ok_or(VariableError::MissingContextValue("response_headers"))
    }

    /// True once a slot vector has been attached.
    pub fn is_variable_enabled(&self) -> bool {
        self.values.is_some()
    }

    /// Length of the slot vector, `None` if the context has none.
    pub fn slot_count(&self) -> Option<usize> {
        self.slots().map(|slots| slots.len())
    }

    /// Copy of the slot at `index`.
    pub fn slot(&self, index: usize) -> Option<IndexedValue> {
        self.slots().and_then(|slots| slots.get(index).cloned())
    }

    pub(crate) fn store_slot(&self, index: usize, value: IndexedValue) {
        if let Some(mut slots) = self.slots() {
            if let Some(slot) = slots.get_mut(index) {
                *slot = value;
            }
        }
    }

    /// Move the slot out, leaving it unevaluated until stored back.
    pub(crate) fn take_slot(&self, index: usize) -> Option<IndexedValue> {
        self.slots()
            .and_then(|mut slots| slots.get_mut(index).map(mem::take))
    }

    fn slots(&self) -> Option<MutexGuard<'_, Vec<IndexedValue>>> {
        self.values
            .as_ref()
            .map(|values| values.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_info", &self.request_info.is_some())
            .field("request_headers", &self.request_headers.is_some())
            .field("response_headers", &self.response_headers.is_some())
            .field("slots", &self.slot_count())
            .finish()
    }
}
