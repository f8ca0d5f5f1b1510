//! Binding Engine - View handles, scopes and the property cache.
//!
//! The engine holds the UI-thread bookkeeping every bound view has:
//! - Registry: generational handle allocation, native id lookup
//! - Scope: the LocalContext each initialized subtree root carries
//! - Cache: last-applied value per view and property
//!
//! # Architecture
//!
//! Views are NOT owned here. The host owns native nodes; the engine only
//! keeps small records keyed by [`ViewHandle`]:
//!
//! ```text
//! v0g0: title   (scope=s0, cache={text: "Todos"})
//! v1g0: todos   (scope=s0, cache={data: [...]})
//! v2g1: label   (scope=s3, cache={text: "Milk"})   // slot 2 reused once
//! ```
//!
//! Everything is thread-local and cleared together on unmount.

pub mod cache;
pub mod registry;
pub mod scope;

pub use registry::{ViewEntry, ViewHandle};
pub use scope::{ScopeBinding, ScopeId};
