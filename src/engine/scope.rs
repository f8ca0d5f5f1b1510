//! Scopes - the LocalContext bound to each initialized subtree root.
//!
//! `initialize(root, context)` creates one scope per root; every view bound
//! under that root points at it. List reconciliation rebinds an item's scope
//! in place when the item moves or its record changes, so callbacks always
//! see the record currently in their slot.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::types::{LocalContext, NativeId, Value};

/// Identity of one bound subtree scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) u64);

/// What a scope resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeBinding {
    /// Tracks the live global state.
    Global { index: f64 },
    /// A fixed record, e.g. one list item.
    Local(LocalContext),
}

thread_local! {
    static SCOPES: RefCell<HashMap<ScopeId, ScopeBinding>> = RefCell::new(HashMap::new());
    static SCOPE_ROOTS: RefCell<HashMap<NativeId, ScopeId>> = RefCell::new(HashMap::new());
    static NEXT_SCOPE: Cell<u64> = const { Cell::new(0) };
}

/// Create a scope rooted at `root`.
///
/// A root that already has a scope gets its binding replaced and keeps its id.
pub fn create_scope(root: NativeId, binding: ScopeBinding) -> ScopeId {
    if let Some(existing) = scope_for_root(root) {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().insert(existing, binding);
        });
        return existing;
    }

    let id = NEXT_SCOPE.with(|next| {
        let id = next.get();
        next.set(id + 1);
        ScopeId(id)
    });
    SCOPES.with(|scopes| {
        scopes.borrow_mut().insert(id, binding);
    });
    SCOPE_ROOTS.with(|roots| {
        roots.borrow_mut().insert(root, id);
    });
    id
}

/// Resolve the LocalContext a view in `scope` sees.
///
/// Views outside any scope get the detached context (`index == -1`).
pub fn resolve(scope: Option<ScopeId>, global: &Value) -> LocalContext {
    let binding = scope.and_then(|id| SCOPES.with(|scopes| scopes.borrow().get(&id).cloned()));
    match binding {
        Some(ScopeBinding::Global { index }) => LocalContext::new(global.clone(), index),
        Some(ScopeBinding::Local(local)) => local,
        None => LocalContext::detached(),
    }
}

/// Update a local scope's record and position in place.
pub fn rebind(scope: ScopeId, state: Value, index: f64) {
    SCOPES.with(|scopes| {
        if let Some(binding) = scopes.borrow_mut().get_mut(&scope) {
            match binding {
                ScopeBinding::Local(local) => {
                    local.state = state;
                    local.index = index;
                }
                ScopeBinding::Global { .. } => {
                    *binding = ScopeBinding::Local(LocalContext::new(state, index));
                }
            }
        }
    });
}

pub fn scope_for_root(root: NativeId) -> Option<ScopeId> {
    SCOPE_ROOTS.with(|roots| roots.borrow().get(&root).copied())
}

pub fn binding(scope: ScopeId) -> Option<ScopeBinding> {
    SCOPES.with(|scopes| scopes.borrow().get(&scope).cloned())
}

/// Drop the scope rooted at `root`, if any.
pub fn release_root(root: NativeId) {
    let id = SCOPE_ROOTS.with(|roots| roots.borrow_mut().remove(&root));
    if let Some(id) = id {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().remove(&id);
        });
    }
}

pub fn scope_count() -> usize {
    SCOPES.with(|scopes| scopes.borrow().len())
}

/// Reset all scope state (for testing).
pub fn reset_scopes() {
    SCOPES.with(|scopes| scopes.borrow_mut().clear());
    SCOPE_ROOTS.with(|roots| roots.borrow_mut().clear());
    NEXT_SCOPE.with(|next| next.set(0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_scope_reads_live_state() {
        reset_scopes();

        let id = create_scope(NativeId(1), ScopeBinding::Global { index: 0.0 });
        let global = Value::map([("count", 1)]);
        let local = resolve(Some(id), &global);
        assert_eq!(local.state, global);
        assert_eq!(local.index, 0.0);

        let global = Value::map([("count", 2)]);
        assert_eq!(resolve(Some(id), &global).state, global);
    }

    #[test]
    fn test_missing_scope_is_detached() {
        reset_scopes();

        let local = resolve(None, &Value::map([("a", 1)]));
        assert_eq!(local.index, -1.0);
        assert!(local.state.is_null());
    }

    #[test]
    fn test_rebind_in_place() {
        reset_scopes();

        let id = create_scope(
            NativeId(5),
            ScopeBinding::Local(LocalContext::new(Value::map([("id", 1)]), 0.0)),
        );
        rebind(id, Value::map([("id", Value::from(1)), ("done", Value::from(true))]), 2.0);

        let local = resolve(Some(id), &Value::Null);
        assert_eq!(local.index, 2.0);
        assert_eq!(local.state.get("done"), Some(&Value::Bool(true)));
        assert_eq!(scope_for_root(NativeId(5)), Some(id));
    }

    #[test]
    fn test_create_twice_keeps_id() {
        reset_scopes();

        let a = create_scope(NativeId(1), ScopeBinding::Global { index: 0.0 });
        let b = create_scope(
            NativeId(1),
            ScopeBinding::Local(LocalContext::new(Value::from("x"), 3.0)),
        );
        assert_eq!(a, b);
        assert_eq!(scope_count(), 1);
        assert_eq!(resolve(Some(a), &Value::Null).index, 3.0);
    }

    #[test]
    fn test_release_root() {
        reset_scopes();

        let id = create_scope(NativeId(9), ScopeBinding::Global { index: 0.0 });
        release_root(NativeId(9));
        assert_eq!(scope_for_root(NativeId(9)), None);
        assert!(binding(id).is_none());
        assert_eq!(resolve(Some(id), &Value::Null).index, -1.0);
    }
}
