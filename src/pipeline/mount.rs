//! Mount API - Runtime lifecycle and the update loop.
//!
//! Mounting installs the host view tree and the runtime on the calling
//! thread, which becomes the UI thread. From then on:
//!
//! - `initialize(root, context)` binds a freshly inflated subtree and runs
//!   `update_all("initialize")`
//! - `update_all(reason)` re-runs every observer, starts the pass's
//!   animations and persists the state
//! - `pump`/`tick`/`run` drain what workers and the animation driver posted
//!   to the UI queue
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::pipeline::mount;
//!
//! let store = Store::load(default_state(), FilePreferences::new(dir), "state");
//! let handle = mount::mount(tree.clone(), store, RuntimeConfig::default())?;
//! mount::initialize_global(root)?;
//!
//! // Option 1: Run blocking event loop
//! mount::run(&handle)?;
//!
//! // Option 2: Tick manually in your own loop
//! while mount::tick(&handle)? {
//!     // Feed native signals to events::dispatch here
//! }
//!
//! handle.unmount();
//! ```

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, TryRecvError};
use spark_signals::{signal, Signal};
use tracing::{debug, warn};

use super::queue::{self, UiSender, UiTask};
use super::workers::WorkerPool;
use crate::config::{DispatchMode, RuntimeConfig};
use crate::engine::scope::{self, ScopeBinding, ScopeId};
use crate::engine::{cache, registry};
use crate::error::{Error, Result};
use crate::host::{self, ViewTree};
use crate::state::animate;
use crate::state::events::{self, Callback, CallbackArgs};
use crate::state::store::Store;
use crate::types::{LocalContext, NativeId, Value};

// =============================================================================
// STATE
// =============================================================================

struct Runtime {
    store: Arc<Store>,
    config: RuntimeConfig,
    sender: UiSender,
    rx: Receiver<UiTask>,
    pool: Option<WorkerPool>,
}

#[derive(Default)]
struct PassState {
    running: bool,
    /// Reason of an update requested while a pass was running.
    pending: Option<String>,
}

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
    static PASS: RefCell<PassState> = RefCell::new(PassState::default());

    static LAST_REASON: Signal<String> = signal(String::new());
    static UPDATE_COUNT: Signal<u64> = signal(0);
}

/// Reason of the most recent completed update pass.
pub fn last_update_reason() -> String {
    LAST_REASON.with(|s| s.get())
}

/// Update passes completed since mount.
pub fn update_count() -> u64 {
    UPDATE_COUNT.with(|s| s.get())
}

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`]. Unmounts on drop.
pub struct MountHandle {
    running: Arc<AtomicBool>,
    store: Arc<Store>,
    sender: UiSender,
    mounted: bool,
}

impl MountHandle {
    /// Tear the runtime down.
    ///
    /// This will:
    /// 1. Set running to false and close the UI queue
    /// 2. Fail any update requests still queued
    /// 3. Join the worker pool
    /// 4. Drop animations, bindings, cache entries, handles and scopes
    /// 5. Uninstall the host tree
    pub fn unmount(mut self) {
        self.teardown();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Make `run` return after its current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Sender for posting update requests from other threads.
    pub fn sender(&self) -> UiSender {
        self.sender.clone()
    }

    fn teardown(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.running.store(false, Ordering::SeqCst);
        self.sender.close();

        if let Some(mut runtime) = RUNTIME.with(|rt| rt.borrow_mut().take()) {
            for task in runtime.rx.drain() {
                if let UiTask::Update { ack, .. } = task {
                    let _ = ack.send(Err("runtime unmounted".to_string()));
                }
            }
            drop(runtime.rx);
            if let Some(pool) = runtime.pool.as_mut() {
                pool.shutdown();
            }
        }

        animate::reset_animations();
        events::unbind_all();
        cache::reset_cache();
        registry::reset_registry();
        scope::reset_scopes();
        PASS.with(|pass| *pass.borrow_mut() = PassState::default());
        host::uninstall_host();
        debug!("unmounted");
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Mount Function
// =============================================================================

/// Mount the runtime on the calling thread.
///
/// Installs `tree` as the host view tree, starts the worker pool (in
/// [`DispatchMode::Workers`]) and opens the UI queue. Nothing is bound until
/// [`initialize`] is called.
pub fn mount(tree: impl ViewTree + 'static, store: Store, config: RuntimeConfig) -> Result<MountHandle> {
    if RUNTIME.with(|rt| rt.borrow().is_some()) {
        return Err(Error::AlreadyMounted);
    }
    host::install_host(Box::new(tree))?;

    let pool = match config.dispatch {
        DispatchMode::Workers => match WorkerPool::new(config.workers) {
            Ok(pool) => Some(pool),
            Err(err) => {
                host::uninstall_host();
                return Err(err);
            }
        },
        DispatchMode::Inline => None,
    };

    let (sender, rx) = queue::channel(config.queue_capacity);
    let store = Arc::new(store);
    events::configure_debounce(config.debounce_window());
    LAST_REASON.with(|s| s.set(String::new()));
    UPDATE_COUNT.with(|s| s.set(0));

    debug!(dispatch = ?config.dispatch, workers = config.workers, "mounted");
    RUNTIME.with(|rt| {
        *rt.borrow_mut() = Some(Runtime {
            store: store.clone(),
            config,
            sender: sender.clone(),
            rx,
            pool,
        });
    });

    Ok(MountHandle {
        running: Arc::new(AtomicBool::new(true)),
        store,
        sender,
        mounted: true,
    })
}

/// Unmount and clean up.
pub fn unmount(handle: MountHandle) {
    handle.unmount();
}

pub fn is_mounted() -> bool {
    RUNTIME.with(|rt| rt.borrow().is_some())
}

pub(crate) fn store() -> Result<Arc<Store>> {
    RUNTIME.with(|rt| rt.borrow().as_ref().map(|rt| rt.store.clone()).ok_or(Error::NotMounted))
}

fn pass_context() -> Result<(Arc<Store>, RuntimeConfig, UiSender)> {
    RUNTIME.with(|rt| {
        rt.borrow()
            .as_ref()
            .map(|rt| (rt.store.clone(), rt.config.clone(), rt.sender.clone()))
            .ok_or(Error::NotMounted)
    })
}

// =============================================================================
// Initialize & Update
// =============================================================================

/// Bind every keyed view under `root` to `context`, then run an update pass.
pub fn initialize(root: NativeId, context: LocalContext) -> Result<ScopeId> {
    let scope = events::bind_subtree(root, ScopeBinding::Local(context))?;
    update_all("initialize")?;
    Ok(scope)
}

/// Like [`initialize`], with views seeing the live global state as their
/// local state.
pub fn initialize_global(root: NativeId) -> Result<ScopeId> {
    let scope = events::bind_subtree(root, ScopeBinding::Global { index: -1.0 })?;
    update_all("initialize")?;
    Ok(scope)
}

/// Re-run every observer, start queued animations and persist the state.
///
/// A call made while a pass is running (from an observer or a handler)
/// schedules one more pass, which runs before the outermost call returns.
pub fn update_all(reason: &str) -> Result<()> {
    let (store, config, sender) = pass_context()?;

    let nested = PASS.with(|pass| {
        let mut pass = pass.borrow_mut();
        if pass.running {
            pass.pending = Some(reason.to_string());
            true
        } else {
            pass.running = true;
            false
        }
    });
    if nested {
        debug!(reason, "update requested during pass; rerun scheduled");
        return Ok(());
    }

    let result = run_passes(reason, &store, &config, &sender);
    PASS.with(|pass| *pass.borrow_mut() = PassState::default());
    result
}

fn run_passes(reason: &str, store: &Store, config: &RuntimeConfig, sender: &UiSender) -> Result<()> {
    let mut reason = reason.to_string();
    let mut passes = 0;
    loop {
        run_pass(&reason, store, config, sender)?;
        passes += 1;

        let Some(next) = PASS.with(|pass| pass.borrow_mut().pending.take()) else {
            return Ok(());
        };
        if passes >= config.max_update_passes.max(1) {
            warn!(reason = %next, passes, "update passes exhausted; rerun dropped");
            return Ok(());
        }
        reason = next;
    }
}

fn run_pass(reason: &str, store: &Store, config: &RuntimeConfig, sender: &UiSender) -> Result<()> {
    animate::clear_queue();
    let global = store.snapshot();
    let observers = events::observers();
    debug!(reason, observers = observers.len(), "update pass");

    for handle in observers {
        events::run_observer(handle, &global)?;
    }

    animate::start(config.animation_duration(), config.frame_interval(), Some(sender.clone()));
    store.persist()?;

    LAST_REASON.with(|s| s.set(reason.to_string()));
    UPDATE_COUNT.with(|s| s.set(s.get() + 1));
    Ok(())
}

/// Run an accepted interaction callback, then an update pass.
///
/// Inline mode does both on the calling (UI) thread. Workers mode runs the
/// callback on the pool against a copy of the state, so a slow callback never
/// holds the state lock; the worker then requests the update from the UI
/// thread and waits for it.
pub(crate) fn hand_off(callback: Callback, event: Value, scope: Option<ScopeId>, reason: &str) -> Result<()> {
    let (store, _, sender) = pass_context()?;
    let local = store.read(|global| scope::resolve(scope, global));

    let job = {
        let (store, callback, event, local) = (store.clone(), callback.clone(), event.clone(), local.clone());
        let reason = reason.to_string();
        move || {
            store.update(|global| callback(global, &CallbackArgs { event: &event, local: &local }));
            if let Err(err) = sender.request_update(&reason) {
                warn!(reason = %reason, %err, "update after callback failed");
            }
        }
    };

    let inline = RUNTIME.with(|rt| -> Result<bool> {
        let rt = rt.borrow();
        let rt = rt.as_ref().ok_or(Error::NotMounted)?;
        match rt.pool.as_ref() {
            Some(pool) => {
                pool.submit(job)?;
                Ok(false)
            }
            None => Ok(true),
        }
    })?;

    if inline {
        store.update(|global| callback(global, &CallbackArgs { event: &event, local: &local }));
        update_all(reason)?;
    }
    Ok(())
}

// =============================================================================
// Event Loop
// =============================================================================

fn handle_task(task: UiTask) -> Result<()> {
    match task {
        UiTask::Update { reason, ack } => {
            let result = update_all(&reason);
            let _ = ack.send(result.as_ref().map(|_| ()).map_err(|err| err.to_string()));
            result
        }
        UiTask::Frame => {
            animate::frame(Instant::now());
            Ok(())
        }
    }
}

fn receiver() -> Result<Receiver<UiTask>> {
    RUNTIME.with(|rt| rt.borrow().as_ref().map(|rt| rt.rx.clone()).ok_or(Error::NotMounted))
}

/// Drain everything currently queued for the UI thread without blocking.
///
/// Returns the number of tasks handled. A failing update pass is reported to
/// the worker that requested it and returned here as well.
pub fn pump(handle: &MountHandle) -> Result<usize> {
    if !handle.is_running() {
        return Ok(0);
    }
    let rx = receiver()?;
    let mut handled = 0;
    loop {
        match rx.try_recv() {
            Ok(task) => {
                handled += 1;
                handle_task(task)?;
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(handled),
        }
    }
}

/// Wait up to one frame interval for UI work and handle it.
///
/// # Returns
///
/// * `Ok(true)` - Continue running
/// * `Ok(false)` - Stop requested via `handle.stop()`
pub fn tick(handle: &MountHandle) -> Result<bool> {
    if !handle.is_running() {
        return Ok(false);
    }
    let interval = RUNTIME.with(|rt| rt.borrow().as_ref().map(|rt| rt.config.frame_interval()));
    let interval = interval.ok_or(Error::NotMounted)?;

    match receiver()?.recv_timeout(interval) {
        Ok(task) => {
            handle_task(task)?;
            pump(handle)?;
        }
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
    }
    Ok(handle.is_running())
}

/// Run the event loop (blocking until `handle.stop()`).
pub fn run(handle: &MountHandle) -> Result<()> {
    while tick(handle)? {}
    Ok(())
}

/// Tick until workers are idle, no ramp is active and the queue is empty.
///
/// Returns `Ok(false)` if `timeout` passed first.
pub fn settle(handle: &MountHandle, timeout: Duration) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        pump(handle)?;
        let workers_idle = RUNTIME.with(|rt| {
            rt.borrow()
                .as_ref()
                .and_then(|rt| rt.pool.as_ref().map(WorkerPool::is_idle))
                .unwrap_or(true)
        });
        if workers_idle && !animate::is_animating() && handle.sender.pending() == 0 {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tick(handle)?;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryTree, Template};
    use crate::state::store::MemoryPreferences;

    fn mount_inline(tree: &MemoryTree) -> MountHandle {
        let store = Store::new(Value::map([("n", 0)]), MemoryPreferences::new(), "state");
        mount(tree.clone(), store, RuntimeConfig::inline()).unwrap()
    }

    #[test]
    fn test_mount_twice_fails() {
        let tree = MemoryTree::new();
        let handle = mount_inline(&tree);
        let again = mount(
            tree.clone(),
            Store::new(Value::Null, MemoryPreferences::new(), "state"),
            RuntimeConfig::inline(),
        );
        assert!(matches!(again, Err(Error::AlreadyMounted)));
        handle.unmount();
        assert!(!is_mounted());
    }

    #[test]
    fn test_update_without_mount() {
        assert!(matches!(update_all("data"), Err(Error::NotMounted)));
    }

    #[test]
    fn test_update_all_counts_and_persists() {
        let tree = MemoryTree::new();
        let prefs = MemoryPreferences::new();
        let store = Store::new(Value::map([("n", 1)]), prefs.clone(), "state");
        let handle = mount(tree.clone(), store, RuntimeConfig::inline()).unwrap();

        update_all("data").unwrap();
        update_all("onClick").unwrap();
        assert_eq!(update_count(), 2);
        assert_eq!(last_update_reason(), "onClick");
        assert!(prefs.entry("state").unwrap().contains("\"n\":1"));
        handle.unmount();
    }

    #[test]
    fn test_nested_update_runs_before_return() {
        let tree = MemoryTree::new();
        let handle = mount_inline(&tree);
        let nested = events::observe("title", |_, _, _| {
            if update_count() == 0 {
                update_all("nested")?;
            }
            Ok(())
        });

        let root = tree.build(&Template::text("title"));
        initialize_global(root).unwrap();
        assert_eq!(update_count(), 2);
        assert_eq!(last_update_reason(), "nested");

        nested();
        handle.unmount();
    }

    #[test]
    fn test_reruns_are_bounded() {
        let tree = MemoryTree::new();
        let store = Store::new(Value::Null, MemoryPreferences::new(), "state");
        let config = RuntimeConfig {
            max_update_passes: 3,
            ..RuntimeConfig::inline()
        };
        let handle = mount(tree.clone(), store, config).unwrap();
        let _ = events::observe("loop", |_, _, _| update_all("again"));

        let root = tree.build(&Template::text("loop"));
        initialize_global(root).unwrap();
        assert_eq!(update_count(), 3);
        handle.unmount();
    }

    #[test]
    fn test_unmount_resets_bindings() {
        let tree = MemoryTree::new();
        let handle = mount_inline(&tree);
        let root = tree.build(&Template::container("root").child(Template::text("title")));
        initialize_global(root).unwrap();
        assert_eq!(registry::allocated_count(), 2);

        handle.unmount();
        assert_eq!(registry::allocated_count(), 0);
        assert!(!host::is_installed());
    }

    #[test]
    fn test_stop_ends_tick() {
        let tree = MemoryTree::new();
        let handle = mount_inline(&tree);
        assert!(tick(&handle).unwrap());
        handle.stop();
        assert!(!tick(&handle).unwrap());
        run(&handle).unwrap();
    }
}
