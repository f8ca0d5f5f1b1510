//! Component - the property-setting surface observers work with.
//!
//! An observer receives a [`Component`] for its view and sets the full
//! property set it wants on every pass. Each `set` goes through the property
//! cache first; only changed values reach a handler, and only handlers touch
//! the native view.
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::state::events::observe;
//!
//! observe("title", |component, local, global| {
//!     component.set("text", global.get("title").cloned())?;
//!     component.set("visible", local.index >= 0.0)?;
//!     Ok(())
//! });
//! ```

mod handlers;
pub mod property;
pub mod reconcile;

pub use property::PropertyKey;
pub use reconcile::{reconcile, ReconcileReport};

use crate::engine::cache::{self, Change};
use crate::engine::registry::{self, ViewEntry, ViewHandle};
use crate::error::{Error, Result};
use crate::types::{NativeId, Value, ViewKey, ViewKind};

/// One bound view, as seen by an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    handle: ViewHandle,
    native: NativeId,
    kind: ViewKind,
    key: ViewKey,
}

impl Component {
    pub(crate) fn new(handle: ViewHandle, entry: &ViewEntry) -> Self {
        Self {
            handle,
            native: entry.native,
            kind: entry.kind,
            key: entry.key.clone(),
        }
    }

    /// Component for a live handle.
    pub fn from_handle(handle: ViewHandle) -> Result<Self> {
        registry::get_entry(handle)
            .map(|entry| Self::new(handle, &entry))
            .ok_or_else(|| Error::UnknownView(handle.to_string()))
    }

    pub fn handle(&self) -> ViewHandle {
        self.handle
    }

    pub fn native(&self) -> NativeId {
        self.native
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    /// Set a property by name.
    ///
    /// Unknown names fail with [`Error::UnknownProperty`] before anything is
    /// cached. Setting the value a property already has is a no-op.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let key: PropertyKey = key.parse()?;
        self.apply(key, value.into())
    }

    /// Set a property by key.
    pub fn apply(&self, key: PropertyKey, value: Value) -> Result<()> {
        match cache::diff_and_store(self.handle, key, &value) {
            Change::Unchanged => Ok(()),
            Change::Changed { previous } => handlers::apply(self, key, &value, previous.as_ref()),
        }
    }

    /// Last value set for a property.
    pub fn get(&self, key: PropertyKey) -> Option<Value> {
        cache::get(self.handle, key)
    }
}
