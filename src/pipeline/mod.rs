//! Update Pipeline
//!
//! Connects interaction callbacks on worker threads to update passes on the
//! UI thread.
//!
//! # Pipeline Architecture
//!
//! ```text
//! native signal → dispatch → worker (callback) → UI queue → update_all → observers → handlers
//! ```
//!
//! ## Data Flow
//!
//! 1. **dispatch** - De-bounces or suppresses, hides the keyboard, hands off
//! 2. **workers** - Run the callback with write access to the global state
//! 3. **queue** - Carries the update request back and acks it when done
//! 4. **mount** - Runs the pass: observers, animation ramp, persistence
//!
//! With `DispatchMode::Inline` steps 2 and 3 happen on the UI thread.

pub mod mount;
pub mod queue;
pub mod workers;

pub use mount::{
    initialize, initialize_global, last_update_reason, mount, pump, run, settle, tick, unmount,
    update_all, update_count, MountHandle,
};
pub use queue::UiSender;
pub use workers::WorkerPool;
