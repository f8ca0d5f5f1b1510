//! Property Cache - last applied value per view and property.
//!
//! This is the dedup layer in front of every native mutation. A property is
//! re-applied only when its cached value is missing or structurally
//! different, so re-running an observer with unchanged state costs a map
//! lookup per property and never touches the native view.
//!
//! Entries are created lazily on first store and dropped when the view is
//! released.

use std::cell::RefCell;
use std::collections::HashMap;

use super::registry::ViewHandle;
use crate::component::PropertyKey;
use crate::types::Value;

/// Outcome of [`diff_and_store`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Cached value equals the new one; nothing stored.
    Unchanged,
    /// New value stored. `previous` is what was cached before, if anything.
    Changed { previous: Option<Value> },
}

impl Change {
    pub fn is_changed(&self) -> bool {
        matches!(self, Change::Changed { .. })
    }
}

thread_local! {
    static CACHE: RefCell<HashMap<ViewHandle, HashMap<PropertyKey, Value>>> = RefCell::new(HashMap::new());
}

/// Compare `value` against the cache and store it if it differs.
pub fn diff_and_store(handle: ViewHandle, key: PropertyKey, value: &Value) -> Change {
    CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let props = cache.entry(handle).or_default();
        match props.get(&key) {
            Some(previous) if previous == value => Change::Unchanged,
            _ => Change::Changed {
                previous: props.insert(key, value.clone()),
            },
        }
    })
}

pub fn get(handle: ViewHandle, key: PropertyKey) -> Option<Value> {
    CACHE.with(|cache| {
        cache
            .borrow()
            .get(&handle)
            .and_then(|props| props.get(&key).cloned())
    })
}

/// Store without comparing. Used when the native side already changed
/// (user input, animation frames) and the cache has to catch up.
pub fn store(handle: ViewHandle, key: PropertyKey, value: Value) {
    CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry(handle)
            .or_default()
            .insert(key, value);
    });
}

/// Drop every cached property of a view. Returns whether an entry existed.
pub fn release(handle: ViewHandle) -> bool {
    CACHE.with(|cache| cache.borrow_mut().remove(&handle).is_some())
}

pub fn has_entry(handle: ViewHandle) -> bool {
    CACHE.with(|cache| cache.borrow().contains_key(&handle))
}

pub fn entry_count() -> usize {
    CACHE.with(|cache| cache.borrow().len())
}

/// Reset the cache (for testing).
pub fn reset_cache() {
    CACHE.with(|cache| cache.borrow_mut().clear());
}
