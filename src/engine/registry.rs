//! View Registry - Handle allocation for bound native views.
//!
//! Every native node the runtime binds gets a [`ViewHandle`]:
//! - Slot index + generation, so a handle to a removed view never aliases
//!   the view that later reuses its slot
//! - Free slot pool for O(1) reuse
//! - Native id → handle lookup for dispatching native signals
//!
//! The registry lives on the UI thread. Handles are `Copy` and cheap to
//! store in other registries (cache, bindings, observers).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use super::scope::ScopeId;
use crate::types::{NativeId, ViewKey, ViewKind};

// =============================================================================
// Types
// =============================================================================

/// Runtime identity of one bound native view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewHandle {
    index: u32,
    generation: u32,
}

impl ViewHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}g{}", self.index, self.generation)
    }
}

/// What the runtime knows about a bound view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEntry {
    pub native: NativeId,
    pub key: ViewKey,
    pub kind: ViewKind,
    /// Scope whose LocalContext callbacks for this view receive.
    pub scope: Option<ScopeId>,
}

struct Slot {
    generation: u32,
    entry: Option<ViewEntry>,
}

// =============================================================================
// Registry State
// =============================================================================

thread_local! {
    static SLOTS: RefCell<Vec<Slot>> = const { RefCell::new(Vec::new()) };

    /// Pool of freed slot indices for reuse.
    static FREE_INDICES: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };

    static NATIVE_TO_HANDLE: RefCell<HashMap<NativeId, ViewHandle>> = RefCell::new(HashMap::new());
}

// =============================================================================
// Allocation
// =============================================================================

/// Allocate a handle for a native view.
///
/// Binding the same native node twice returns the handle it already has.
pub fn allocate_handle(entry: ViewEntry) -> ViewHandle {
    if let Some(existing) = get_handle(entry.native) {
        return existing;
    }

    let native = entry.native;
    let handle = SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        let reused = FREE_INDICES.with(|free| free.borrow_mut().pop());
        match reused {
            Some(index) => {
                let slot = &mut slots[index as usize];
                slot.entry = Some(entry);
                ViewHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = slots.len() as u32;
                slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ViewHandle {
                    index,
                    generation: 0,
                }
            }
        }
    });

    NATIVE_TO_HANDLE.with(|map| {
        map.borrow_mut().insert(native, handle);
    });

    handle
}

/// Release a handle back to the pool.
///
/// Returns the entry that was bound, or `None` for a stale handle.
/// Only this view is released; subtree walks are the caller's business.
pub fn release_handle(handle: ViewHandle) -> Option<ViewEntry> {
    let entry = SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        let slot = slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(entry)
    })?;

    NATIVE_TO_HANDLE.with(|map| {
        map.borrow_mut().remove(&entry.native);
    });
    FREE_INDICES.with(|free| {
        free.borrow_mut().push(handle.index);
    });

    Some(entry)
}

/// Point a bound view at another scope.
pub fn set_scope(handle: ViewHandle, scope: Option<ScopeId>) {
    SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        if let Some(slot) = slots.get_mut(handle.index as usize) {
            if slot.generation == handle.generation {
                if let Some(entry) = slot.entry.as_mut() {
                    entry.scope = scope;
                }
            }
        }
    });
}

// =============================================================================
// Lookups
// =============================================================================

pub fn get_entry(handle: ViewHandle) -> Option<ViewEntry> {
    SLOTS.with(|slots| {
        let slots = slots.borrow();
        let slot = slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.clone()
    })
}

/// Handle currently bound to a native node.
pub fn get_handle(native: NativeId) -> Option<ViewHandle> {
    NATIVE_TO_HANDLE.with(|map| map.borrow().get(&native).copied())
}

/// Check if a handle still refers to a bound view.
pub fn is_alive(handle: ViewHandle) -> bool {
    get_entry(handle).is_some()
}

/// Check if a handle was issued and has since been released.
pub fn was_released(handle: ViewHandle) -> bool {
    SLOTS.with(|slots| {
        slots.borrow().get(handle.index as usize).is_some_and(|slot| {
            slot.generation != handle.generation || slot.entry.is_none()
        })
    })
}

pub fn allocated_count() -> usize {
    NATIVE_TO_HANDLE.with(|map| map.borrow().len())
}

/// All live handles, in slot order.
pub fn allocated_handles() -> Vec<ViewHandle> {
    let mut handles: Vec<ViewHandle> =
        NATIVE_TO_HANDLE.with(|map| map.borrow().values().copied().collect());
    handles.sort();
    handles
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Reset all registry state.
pub fn reset_registry() {
    SLOTS.with(|slots| slots.borrow_mut().clear());
    FREE_INDICES.with(|free| free.borrow_mut().clear());
    NATIVE_TO_HANDLE.with(|map| map.borrow_mut().clear());
}
