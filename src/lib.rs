//! # spark-bind
//!
//! Reactive view binding and list reconciliation for native view trees.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for the
//! runtime's observable status.
//!
//! ## Architecture
//!
//! The host owns a live, mutable view tree. Application logic registers
//! callbacks per view key; the runtime binds them to the native nodes, re-runs
//! every observer on each update pass and turns the property values they set
//! into the smallest set of native mutations:
//!
//! ```text
//! initialize → bind subtree → update_all → observers → Component::set
//!     → property cache (dedup) → handler → mutation | animation | reconcile
//! ```
//!
//! Interactions flow the other way: the host reports a native signal, the
//! dispatcher de-bounces it, a worker runs the callback against the global
//! state, and the UI thread runs the next pass.
//!
//! ## Modules
//!
//! - [`types`] - Core types (Value, LocalContext, ViewKey, Rgba, etc.)
//! - [`engine`] - View handles, scopes, property cache
//! - [`component`] - Property table, handlers, list reconciler
//! - [`host`] - The `ViewTree` boundary and an in-memory tree
//! - [`state`] - Global store, event registry, animation scheduler
//! - [`pipeline`] - Mount, update passes, UI queue, worker pool

pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::{DispatchMode, RuntimeConfig};
pub use error::{Error, Result};

pub use engine::{ScopeBinding, ScopeId, ViewHandle};

pub use component::{Component, PropertyKey, ReconcileReport};

pub use host::memory::{MemoryTree, Template};
pub use host::{EventMask, Mutation, ViewTree};

pub use state::{
    dispatch, observe, on_change, on_click, on_context, on_enter, on_init, on_resize,
    Dispatch, FilePreferences, MemoryPreferences, NativeSignal, Preferences, Store,
};

pub use pipeline::{
    initialize, initialize_global, last_update_reason, mount, pump, run, settle, tick, unmount,
    update_all, update_count, MountHandle,
};
