//! Lexical variable scopes.
//!
//! A [`Scope`] is an ordered name table with an optional outer scope. Lookups
//! and assignments walk outward through the chain; definitions and deletions
//! only touch the scope they are issued on.
//!
//! Names made only of underscores (`_`, `__`, ...) are discard names: defining
//! or assigning them is a no-op and reading them is a `NameError`.

use crate::{
    exception_private::{ExcType, RunResult},
    heap::{Heap, ScopeId},
    value::{Members, Value},
};

/// One level of the scope chain.
#[derive(Debug)]
pub(crate) struct Scope {
    pub vars: Members,
    pub outer: Option<ScopeId>,
}

impl Scope {
    pub fn new(outer: Option<ScopeId>) -> Self {
        Self {
            vars: Members::default(),
            outer,
        }
    }
}

/// Returns true for non-empty names made only of underscores.
#[must_use]
pub fn is_discard_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b == b'_')
}

impl Heap {
    /// Resolves `name` starting at `scope` and walking outward.
    pub fn scope_get(&self, scope: ScopeId, name: &str) -> RunResult<Value> {
        if is_discard_name(name) {
            return Err(ExcType::name_error(name));
        }
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(value) = scope.vars.get(name) {
                return Ok(*value);
            }
            current = scope.outer;
        }
        Err(ExcType::name_error(name))
    }

    /// Binds `name` in `scope` itself, shadowing any outer binding.
    pub fn scope_define(&mut self, scope: ScopeId, name: &str, value: Value) {
        if is_discard_name(name) {
            return;
        }
        self.scope_mut(scope).vars.insert(name.to_owned(), value);
    }

    /// Rebinds the nearest existing binding of `name`.
    pub fn scope_set(&mut self, scope: ScopeId, name: &str, value: Value) -> RunResult<()> {
        if is_discard_name(name) {
            return Ok(());
        }
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope_mut(id);
            if let Some(slot) = scope.vars.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            current = scope.outer;
        }
        Err(ExcType::name_error(name))
    }

    /// Removes `name` from `scope` itself; outer bindings are never touched.
    pub fn scope_delete(&mut self, scope: ScopeId, name: &str) -> RunResult<()> {
        match self.scope_mut(scope).vars.shift_remove(name) {
            Some(_) => Ok(()),
            None => Err(ExcType::name_error(name)),
        }
    }

    /// Creates a child scope whose outer scope is `scope`.
    pub fn create_inner_scope(&mut self, scope: ScopeId) -> RunResult<ScopeId> {
        self.allocate_scope(Some(scope))
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub fn scope_is_within(&self, inner: ScopeId, outer: ScopeId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if id == outer {
                return true;
            }
            current = self.scope(id).outer;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exception_private::RunError, resource::NoLimitTracker};

    fn heap() -> Heap {
        Heap::new(Box::new(NoLimitTracker))
    }

    fn is_name_error(result: RunResult<impl Sized>) -> bool {
        matches!(result, Err(err) if err.is_exception_type(ExcType::NameError))
    }

    #[test]
    fn discard_names() {
        assert!(is_discard_name("_"));
        assert!(is_discard_name("___"));
        assert!(!is_discard_name(""));
        assert!(!is_discard_name("_x"));
    }

    #[test]
    fn define_then_get_round_trips() {
        let mut heap = heap();
        let outer = heap.allocate_scope(None).unwrap();
        let inner = heap.create_inner_scope(outer).unwrap();
        let value = heap.int(7).unwrap();
        heap.scope_define(outer, "x", value);
        assert_eq!(heap.scope_get(inner, "x").unwrap(), value);
    }

    #[test]
    fn set_without_binding_is_name_error() {
        let mut heap = heap();
        let scope = heap.allocate_scope(None).unwrap();
        let value = heap.int(1).unwrap();
        assert!(is_name_error(heap.scope_set(scope, "missing", value)));
    }

    #[test]
    fn set_in_inner_mutates_outer_binding() {
        let mut heap = heap();
        let outer = heap.allocate_scope(None).unwrap();
        let inner = heap.create_inner_scope(outer).unwrap();
        let one = heap.int(1).unwrap();
        let two = heap.int(2).unwrap();
        heap.scope_define(outer, "x", one);
        heap.scope_set(inner, "x", two).unwrap();
        assert_eq!(heap.scope_get(outer, "x").unwrap(), two);
        assert!(heap.scope(inner).vars.is_empty());
    }

    #[test]
    fn delete_only_touches_current_scope() {
        let mut heap = heap();
        let outer = heap.allocate_scope(None).unwrap();
        let inner = heap.create_inner_scope(outer).unwrap();
        let value = heap.int(1).unwrap();
        heap.scope_define(outer, "x", value);
        assert!(is_name_error(heap.scope_delete(inner, "x")));
        heap.scope_delete(outer, "x").unwrap();
        assert!(is_name_error(heap.scope_get(inner, "x")));
    }

    #[test]
    fn discard_name_is_never_bound() {
        let mut heap = heap();
        let scope = heap.allocate_scope(None).unwrap();
        let value = heap.int(1).unwrap();
        heap.scope_define(scope, "_", value);
        heap.scope_set(scope, "__", value).unwrap();
        assert!(heap.scope(scope).vars.is_empty());
        assert!(matches!(heap.scope_get(scope, "_"), Err(RunError::Exc(_))));
    }
}
