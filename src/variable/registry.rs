//! Process-wide variable registry.
//!
//! # Responsibilities
//! - Register basic, indexed and prefix variables under unique names
//! - Promote prefix-family names into concrete indexed variables
//! - Evaluate variables against a request context, memoising indexed ones
//!
//! # Design Decisions
//! - Tables are an immutable snapshot behind `ArcSwap`; reads never lock
//! - Writers serialise on a mutex and publish a modified copy
//! - Prefix matching picks the longest registered prefix

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use arc_swap::ArcSwap;

use super::context::RequestContext;
use super::types::{IndexedValue, Variable, VariableError, VariableKind, VALUE_NOT_FOUND};

#[derive(Debug, Clone, Default)]
struct Tables {
    /// All registered variables, basic and indexed.
    variables: HashMap<String, Arc<Variable>>,
    /// Prefix families keyed by prefix.
    prefixes: HashMap<String, Arc<Variable>>,
    /// Indexed variables in index order.
    indexed: Vec<Arc<Variable>>,
}

impl Tables {
    fn longest_prefix(&self, name: &str) -> Option<&Arc<Variable>> {
        self.prefixes
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, variable)| variable)
    }
}

/// Registry of variable definitions.
pub struct VariableRegistry {
    tables: ArcSwap<Tables>,
    write_lock: Mutex<()>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<VariableRegistry>> = OnceLock::new();

impl VariableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tables: ArcSwap::from_pointee(Tables::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<VariableRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(VariableRegistry::new()))
            .clone()
    }

    /// Register a variable. Indexed variables receive the next free index.
    pub fn register_variable(&self, variable: Variable) -> Result<Arc<Variable>, VariableError> {
        let _guard = self.write_guard();
        self.register_locked(variable)
    }

    /// Register a prefix family such as `request_header_`.
    pub fn register_prefix_variable(
        &self,
        prefix: impl Into<String>,
        variable: Variable,
    ) -> Result<(), VariableError> {
        let prefix = prefix.into();
        let _guard = self.write_guard();

        let current = self.tables.load_full();
        if current.prefixes.contains_key(&prefix) {
            return Err(VariableError::DuplicatePrefix(prefix));
        }

        let mut next = Tables::clone(&current);
        tracing::debug!(prefix = %prefix, "Prefix variable registered");
        next.prefixes.insert(prefix, Arc::new(variable));
        self.tables.store(Arc::new(next));
        Ok(())
    }

    /// Look up `name`, promoting it from a prefix family if needed.
    pub fn add_variable(&self, name: &str) -> Result<Arc<Variable>, VariableError> {
        if let Some(variable) = self.lookup(name) {
            return Ok(variable);
        }

        let _guard = self.write_guard();
        let current = self.tables.load_full();
        // another writer may have promoted it meanwhile
        if let Some(variable) = current.variables.get(name) {
            return Ok(variable.clone());
        }

        let prefix = current
            .longest_prefix(name)
            .ok_or_else(|| VariableError::UndefinedVariable(name.to_string()))?;
        let promoted = Variable::promoted(name, prefix);
        self.register_locked(promoted)
    }

    /// Registered variable called `name`, without prefix promotion.
    pub fn lookup(&self, name: &str) -> Option<Arc<Variable>> {
        self.tables.load().variables.get(name).cloned()
    }

    /// Attach a slot vector sized to the current indexed-variable count.
    pub fn new_variable_context(&self, ctx: RequestContext) -> RequestContext {
        ctx.with_slots(self.indexed_count())
    }

    /// Evaluate variable `name` for the request.
    ///
    /// Names that were never registered but match a prefix family are
    /// evaluated through the prefix getter without caching.
    pub fn get_variable_value(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<String, VariableError> {
        let tables = self.tables.load();
        if let Some(variable) = tables.variables.get(name) {
            return evaluate(ctx, variable);
        }

        match tables.longest_prefix(name) {
            Some(prefix) => invoke_getter(ctx, prefix, Some(name)),
            None => Err(VariableError::UndefinedVariable(name.to_string())),
        }
    }

    /// Write `value` through the setter of variable `name`.
    pub fn set_variable_value(
        &self,
        ctx: &RequestContext,
        name: &str,
        value: &str,
    ) -> Result<(), VariableError> {
        let variable = self
            .lookup(name)
            .ok_or_else(|| VariableError::UndefinedVariable(name.to_string()))?;
        let setter = variable
            .setter()
            .ok_or_else(|| VariableError::SetterNotFound(name.to_string()))?;

        let Some(index) = variable.index() else {
            return setter(ctx, None, variable.data(), value);
        };
        let count = ctx.slot_count().ok_or(VariableError::NoVariablesInContext)?;
        let index = index as usize;
        if index >= count {
            return setter(ctx, None, variable.data(), value);
        }

        let mut slot = ctx.take_slot(index).unwrap_or_default();
        let result = setter(ctx, Some(&mut slot), variable.data(), value);
        ctx.store_slot(index, slot);
        result
    }

    pub fn indexed_count(&self) -> usize {
        self.tables.load().indexed.len()
    }

    /// Sorted names of every registered variable.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.load().variables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted registered prefixes.
    pub fn prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self.tables.load().prefixes.keys().cloned().collect();
        prefixes.sort();
        prefixes
    }

    /// Drop every registration. Contexts created earlier keep their slots.
    pub fn clear(&self) {
        let _guard = self.write_guard();
        self.tables.store(Arc::new(Tables::default()));
    }

    fn register_locked(&self, mut variable: Variable) -> Result<Arc<Variable>, VariableError> {
        let current = self.tables.load_full();
        if current.variables.contains_key(variable.name()) {
            return Err(VariableError::DuplicateName(variable.name().to_string()));
        }

        let mut next = Tables::clone(&current);
        if variable.kind() == VariableKind::Indexed {
            variable.set_index(next.indexed.len() as u32);
        }
        let variable = Arc::new(variable);
        if variable.kind() == VariableKind::Indexed {
            next.indexed.push(variable.clone());
        }
        next.variables
            .insert(variable.name().to_string(), variable.clone());
        self.tables.store(Arc::new(next));

        tracing::debug!(
            name = %variable.name(),
            index = ?variable.index(),
            "Variable registered"
        );
        Ok(variable)
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate a registered variable against the request context.
///
/// Indexed variables read and fill their slot; a context without a slot
/// vector is an error for them. Variables registered after the context was
/// created fall back to the getter without caching.
pub fn evaluate(ctx: &RequestContext, variable: &Variable) -> Result<String, VariableError> {
    let Some(index) = variable.index() else {
        return invoke_getter(ctx, variable, variable.data());
    };
    let count = ctx.slot_count().ok_or(VariableError::NoVariablesInContext)?;
    let index = index as usize;
    if index >= count {
        return invoke_getter(ctx, variable, variable.data());
    }

    if variable.is_cacheable() {
        if let Some(cached) = ctx.slot(index).and_then(|slot| slot.rendered()) {
            return Ok(cached);
        }
    }

    let getter = variable
        .getter()
        .ok_or_else(|| VariableError::GetterNotFound(variable.name().to_string()))?;
    let mut slot = IndexedValue::default();
    let rendered = match getter(ctx, variable.data())? {
        Some(value) => {
            slot.set(value.as_str());
            value
        }
        None => {
            slot.set_not_found();
            VALUE_NOT_FOUND.to_string()
        }
    };
    ctx.store_slot(index, slot);
    Ok(rendered)
}

fn invoke_getter(
    ctx: &RequestContext,
    variable: &Variable,
    data: Option<&str>,
) -> Result<String, VariableError> {
    let getter = variable
        .getter()
        .ok_or_else(|| VariableError::GetterNotFound(variable.name().to_string()))?;
    Ok(getter(ctx, data)?.unwrap_or_else(|| VALUE_NOT_FOUND.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::types::{basic_setter, FLAG_NOCACHEABLE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(name: &str, calls: Arc<AtomicUsize>, indexed: bool) -> Variable {
        let getter = move |_: &RequestContext, _: Option<&str>| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, VariableError>(Some(format!("call-{}", n)))
        };
        if indexed {
            Variable::new_indexed(name, getter)
        } else {
            Variable::new_basic(name, getter)
        }
    }

    fn echo_prefix(prefix: &'static str) -> Variable {
        Variable::new_basic(prefix, move |_, data| {
            Ok(data.and_then(|d| d.strip_prefix(prefix)).map(|rest| format!("{}:{}", prefix, rest)))
        })
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let registry = VariableRegistry::new();
        registry
            .register_variable(Variable::new_indexed("a", |_, _| Ok(Some("first".into()))))
            .unwrap();

        let err = registry
            .register_variable(Variable::new_basic("a", |_, _| Ok(Some("second".into()))))
            .unwrap_err();
        assert_eq!(err, VariableError::DuplicateName("a".into()));

        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(registry.get_variable_value(&ctx, "a").unwrap(), "first");
        assert_eq!(registry.indexed_count(), 1);
    }

    #[test]
    fn test_indices_are_sequential() {
        let registry = VariableRegistry::new();
        let a = registry
            .register_variable(Variable::new_indexed("a", |_, _| Ok(None)))
            .unwrap();
        let b = registry
            .register_variable(Variable::new_basic("b", |_, _| Ok(None)))
            .unwrap();
        let c = registry
            .register_variable(Variable::new_indexed("c", |_, _| Ok(None)))
            .unwrap();

        assert_eq!(a.index(), Some(0));
        assert_eq!(b.index(), None);
        assert_eq!(c.index(), Some(1));
        assert_eq!(registry.indexed_count(), 2);
    }

    #[test]
    fn test_duplicate_prefix() {
        let registry = VariableRegistry::new();
        registry
            .register_prefix_variable("request_header_", echo_prefix("request_header_"))
            .unwrap();
        assert_eq!(
            registry.register_prefix_variable("request_header_", echo_prefix("request_header_")),
            Err(VariableError::DuplicatePrefix("request_header_".into()))
        );
    }

    #[test]
    fn test_indexed_value_is_memoised() {
        let registry = VariableRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry
            .register_variable(counting("counted", calls.clone(), true))
            .unwrap();

        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(registry.get_variable_value(&ctx, "counted").unwrap(), "call-0");
        assert_eq!(registry.get_variable_value(&ctx, "counted").unwrap(), "call-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // a fresh request evaluates again
        let other = registry.new_variable_context(RequestContext::new());
        assert_eq!(registry.get_variable_value(&other, "counted").unwrap(), "call-1");
    }

    #[test]
    fn test_basic_and_nocacheable_reevaluate() {
        let registry = VariableRegistry::new();
        let basic_calls = Arc::new(AtomicUsize::new(0));
        let nocache_calls = Arc::new(AtomicUsize::new(0));
        registry
            .register_variable(counting("basic", basic_calls.clone(), false))
            .unwrap();
        registry
            .register_variable(
                counting("nocache", nocache_calls.clone(), true).with_flags(FLAG_NOCACHEABLE),
            )
            .unwrap();

        let ctx = registry.new_variable_context(RequestContext::new());
        for _ in 0..3 {
            registry.get_variable_value(&ctx, "basic").unwrap();
            registry.get_variable_value(&ctx, "nocache").unwrap();
        }
        assert_eq!(basic_calls.load(Ordering::SeqCst), 3);
        assert_eq!(nocache_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_not_found_is_cached_as_sentinel() {
        let registry = VariableRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry
            .register_variable(Variable::new_indexed("absent", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }))
            .unwrap();

        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(registry.get_variable_value(&ctx, "absent").unwrap(), "-");
        assert_eq!(registry.get_variable_value(&ctx, "absent").unwrap(), "-");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let slot = ctx.slot(0).unwrap();
        assert!(slot.not_found && !slot.valid);
    }

    #[test]
    fn test_indexed_without_context_slots() {
        let registry = VariableRegistry::new();
        registry
            .register_variable(Variable::new_indexed("a", |_, _| Ok(Some("x".into()))))
            .unwrap();

        let ctx = RequestContext::new();
        assert_eq!(
            registry.get_variable_value(&ctx, "a"),
            Err(VariableError::NoVariablesInContext)
        );
    }

    #[test]
    fn test_late_registration_falls_back_to_getter() {
        let registry = VariableRegistry::new();
        let ctx = registry.new_variable_context(RequestContext::new());

        let calls = Arc::new(AtomicUsize::new(0));
        registry
            .register_variable(counting("late", calls.clone(), true))
            .unwrap();

        assert_eq!(registry.get_variable_value(&ctx, "late").unwrap(), "call-0");
        assert_eq!(registry.get_variable_value(&ctx, "late").unwrap(), "call-1");
        assert_eq!(ctx.slot_count(), Some(0));
    }

    #[test]
    fn test_missing_getter() {
        let registry = VariableRegistry::new();
        registry
            .register_variable(Variable::without_getter("write_only", VariableKind::Basic))
            .unwrap();
        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(
            registry.get_variable_value(&ctx, "write_only"),
            Err(VariableError::GetterNotFound("write_only".into()))
        );
    }

    #[test]
    fn test_undefined_variable() {
        let registry = VariableRegistry::new();
        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(
            registry.get_variable_value(&ctx, "nope"),
            Err(VariableError::UndefinedVariable("nope".into()))
        );
        assert_eq!(
            registry.add_variable("nope").unwrap_err(),
            VariableError::UndefinedVariable("nope".into())
        );
    }

    #[test]
    fn test_add_variable_promotes_prefix_once() {
        let registry = VariableRegistry::new();
        registry
            .register_prefix_variable("request_header_", echo_prefix("request_header_"))
            .unwrap();

        let first = registry.add_variable("request_header_foo").unwrap();
        assert_eq!(first.kind(), VariableKind::Indexed);
        assert_eq!(first.index(), Some(0));
        assert_eq!(first.data(), Some("request_header_foo"));

        let second = registry.add_variable("request_header_foo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.indexed_count(), 1);

        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(
            registry.get_variable_value(&ctx, "request_header_foo").unwrap(),
            "request_header_:foo"
        );
        assert!(ctx.slot(0).unwrap().valid);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = VariableRegistry::new();
        registry
            .register_prefix_variable("request_", echo_prefix("request_"))
            .unwrap();
        registry
            .register_prefix_variable("request_header_", echo_prefix("request_header_"))
            .unwrap();

        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(
            registry.get_variable_value(&ctx, "request_header_host").unwrap(),
            "request_header_:host"
        );
        assert_eq!(
            registry.get_variable_value(&ctx, "request_path").unwrap(),
            "request_:path"
        );

        registry.add_variable("request_header_via").unwrap();
        let ctx = registry.new_variable_context(RequestContext::new());
        assert_eq!(
            registry.get_variable_value(&ctx, "request_header_via").unwrap(),
            "request_header_:via"
        );
    }

    #[test]
    fn test_set_variable_value() {
        let registry = VariableRegistry::new();
        registry
            .register_variable(
                Variable::new_indexed("upstream_cluster", |_, _| Ok(None))
                    .with_setter(basic_setter),
            )
            .unwrap();
        registry
            .register_variable(Variable::new_indexed("read_only", |_, _| Ok(None)))
            .unwrap();

        let ctx = registry.new_variable_context(RequestContext::new());
        registry
            .set_variable_value(&ctx, "upstream_cluster", "outbound|80||svc")
            .unwrap();
        assert_eq!(
            registry.get_variable_value(&ctx, "upstream_cluster").unwrap(),
            "outbound|80||svc"
        );

        assert_eq!(
            registry.set_variable_value(&ctx, "read_only", "x"),
            Err(VariableError::SetterNotFound("read_only".into()))
        );
        assert_eq!(
            registry.set_variable_value(&ctx, "unknown", "x"),
            Err(VariableError::UndefinedVariable("unknown".into()))
        );
        assert_eq!(
            registry.set_variable_value(&RequestContext::new(), "upstream_cluster", "x"),
            Err(VariableError::NoVariablesInContext)
        );
    }

    #[test]
    fn test_clear_and_listing() {
        let registry = VariableRegistry::new();
        registry
            .register_variable(Variable::new_indexed("b", |_, _| Ok(None)))
            .unwrap();
        registry
            .register_variable(Variable::new_basic("a", |_, _| Ok(None)))
            .unwrap();
        registry
            .register_prefix_variable("p_", echo_prefix("p_"))
            .unwrap();

        assert_eq!(registry.variable_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.prefixes(), vec!["p_".to_string()]);

        registry.clear();
        assert!(registry.variable_names().is_empty());
        assert_eq!(registry.indexed_count(), 0);
    }
}
