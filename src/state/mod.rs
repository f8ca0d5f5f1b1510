//! State Module - Application state, events and animation.
//!
//! - **Store** - Global state behind a lock, persisted after every pass
//! - **Events** - Per-key callback registry, binding and native signal dispatch
//! - **Animate** - Interpolations queued during a pass, driven by one ramp

pub mod animate;
pub mod events;
pub mod store;

pub use events::{
    dispatch, observe, on_change, on_click, on_context, on_enter, on_init, on_resize,
    BindState, Callback, CallbackArgs, Dispatch, EventRegistration, NativeSignal,
};
pub use store::{FilePreferences, MemoryPreferences, Preferences, Store};
