//! Event Registry & Dispatcher
//!
//! Application logic registers callbacks per view key before anything is
//! bound. Binding a native subtree attaches those registrations to every
//! keyed view in it; native signals are then dispatched into the callbacks.
//!
//! # API
//!
//! - `on_click`, `on_context`, `on_enter` - Interactions (de-bounced)
//! - `on_change` - Text, checked and selection changes (suppressed when unchanged)
//! - `on_resize` - Layout size changes
//! - `on_init` - Runs once, synchronously, when a view is bound
//! - `observe` - Re-run on every update pass to set the view's properties
//! - `dispatch(native, signal)` - Route a native signal to its callback
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::state::events;
//!
//! events::on_click("add", |global, args| {
//!     let draft = global.get("draft").cloned().unwrap_or_default();
//!     if let Some(Value::List(todos)) = global.get_mut("todos") {
//!         todos.push(Value::map([("id", draft.clone()), ("text", draft)]));
//!     }
//! });
//!
//! events::observe("todos", |component, _local, global| {
//!     component.set("data", global.get("todos").cloned())
//! });
//! ```

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::component::{Component, PropertyKey};
use crate::engine::cache;
use crate::engine::registry::{self, ViewEntry, ViewHandle};
use crate::engine::scope::{self, ScopeBinding, ScopeId};
use crate::error::Result;
use crate::host::{self, collect_subtree, with_host, EventMask, Mutation};
use crate::pipeline::mount;
use crate::types::{LocalContext, NativeId, Size, Value, ViewKey};

// =============================================================================
// TYPES
// =============================================================================

/// What an interaction callback receives besides the global state.
#[derive(Debug, Clone, Copy)]
pub struct CallbackArgs<'a> {
    /// Event payload: `{}` for interactions, `{ value }` for changes,
    /// `{ width, height }` for resizes.
    pub event: &'a Value,
    /// Context of the scope the view was bound in.
    pub local: &'a LocalContext,
}

/// Interaction callback. Runs off the UI thread with write access to the
/// global state.
pub type Callback = Arc<dyn Fn(&mut Value, &CallbackArgs<'_>) + Send + Sync>;

/// Observer. Runs on the UI thread during every update pass.
pub type ObserveCallback = Rc<dyn Fn(&Component, &LocalContext, &Value) -> Result<()>>;

/// Callbacks registered for one view key.
#[derive(Clone, Default)]
pub struct EventRegistration {
    pub on_click: Option<Callback>,
    pub on_context: Option<Callback>,
    pub on_enter: Option<Callback>,
    pub on_init: Option<Callback>,
    pub on_change: Option<Callback>,
    pub on_resize: Option<Callback>,
    pub observe: Option<ObserveCallback>,
}

impl EventRegistration {
    /// Native listeners this registration needs.
    pub fn mask(&self) -> EventMask {
        let mut mask = EventMask::NONE;
        let wanted = [
            (self.on_click.is_some(), EventMask::CLICK),
            (self.on_context.is_some(), EventMask::CONTEXT),
            (self.on_enter.is_some(), EventMask::ENTER),
            (self.on_change.is_some(), EventMask::CHANGE),
            (self.on_resize.is_some(), EventMask::RESIZE),
        ];
        for (present, flag) in wanted {
            if present {
                mask |= flag;
            }
        }
        mask
    }

    pub fn is_empty(&self) -> bool {
        self.mask().is_empty() && self.on_init.is_none() && self.observe.is_none()
    }
}

/// Lifecycle of one view's bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Bound,
    Disposed,
}

/// Signal reported by the host for a native node.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeSignal {
    Click,
    LongPress,
    /// Editor "go" action on a text input.
    Enter,
    TextChanged(String),
    CheckedChanged(bool),
    /// Option at this position was picked in a select control.
    ItemSelected(usize),
    /// Layout bounds changed, in device pixels.
    LayoutChanged { old: Size, new: Size },
}

/// What [`dispatch`] did with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Callback handed off; an update pass follows.
    Accepted,
    /// Inside the de-bounce window.
    Dropped,
    /// Value equal to the cached one.
    Suppressed,
    /// Unbound view or no callback for this signal.
    Ignored,
}

// =============================================================================
// DE-BOUNCE
// =============================================================================

/// Enforces a minimum interval between accepted interactions.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Accept `now` if the window since the last accepted interaction has
    /// passed, and remember it.
    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

struct EventRegistry {
    registrations: HashMap<ViewKey, EventRegistration>,
    bindings: HashMap<ViewHandle, EventRegistration>,
    observers: BTreeSet<ViewHandle>,
    debouncer: Debouncer,
}

impl EventRegistry {
    fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            bindings: HashMap::new(),
            observers: BTreeSet::new(),
            debouncer: Debouncer::new(Duration::from_millis(600)),
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<EventRegistry> = RefCell::new(EventRegistry::new());
}

// =============================================================================
// PUBLIC API - REGISTRATION
// =============================================================================

fn register(key: ViewKey, update: impl FnOnce(&mut EventRegistration)) {
    REGISTRY.with(|reg| {
        update(reg.borrow_mut().registrations.entry(key).or_default());
    });
}

macro_rules! callback_registration {
    ($(#[$doc:meta])* $name:ident => $field:ident) => {
        $(#[$doc])*
        ///
        /// Returns a cleanup function that removes the registration. Views
        /// already bound keep the callbacks they were bound with.
        pub fn $name<F>(key: impl Into<ViewKey>, callback: F) -> impl FnOnce()
        where
            F: Fn(&mut Value, &CallbackArgs<'_>) + Send + Sync + 'static,
        {
            let key = key.into();
            register(key.clone(), |r| r.$field = Some(Arc::new(callback)));
            move || register(key, |r| r.$field = None)
        }
    };
}

callback_registration!(
    /// Register a click callback for every view with `key`.
    on_click => on_click
);
callback_registration!(
    /// Register a long-press callback.
    on_context => on_context
);
callback_registration!(
    /// Register an enter (editor action) callback.
    on_enter => on_enter
);
callback_registration!(
    /// Register a callback run once when each view with `key` is bound.
    on_init => on_init
);
callback_registration!(
    /// Register a value-change callback. The event is `{ "value": new }`.
    on_change => on_change
);
callback_registration!(
    /// Register a resize callback. The event is `{ "width", "height" }` in
    /// logical units.
    on_resize => on_resize
);

/// Register an observer for every view with `key`.
pub fn observe<F>(key: impl Into<ViewKey>, callback: F) -> impl FnOnce()
where
    F: Fn(&Component, &LocalContext, &Value) -> Result<()> + 'static,
{
    let key = key.into();
    register(key.clone(), |r| r.observe = Some(Rc::new(callback)));
    move || register(key, |r| r.observe = None)
}

/// Registration currently on file for `key`.
pub fn registration(key: &ViewKey) -> Option<EventRegistration> {
    REGISTRY.with(|reg| reg.borrow().registrations.get(key).cloned())
}

/// Set the minimum interval between accepted interactions.
pub fn configure_debounce(window: Duration) {
    REGISTRY.with(|reg| reg.borrow_mut().debouncer = Debouncer::new(window));
}

// =============================================================================
// BINDING
// =============================================================================

/// Bind one native view into `scope`.
///
/// Keyless views are skipped (`Ok(None)`). A view that is already bound keeps
/// its scope and its `on_init` does not run again.
pub fn bind_view(native: NativeId, scope: ScopeId) -> Result<Option<ViewHandle>> {
    let (key, kind) = with_host(|h| (h.key(native), h.kind(native)))?;
    let Some(key) = key else {
        return Ok(None);
    };
    if let Some(existing) = registry::get_handle(native) {
        return Ok(Some(existing));
    }

    let registration = registration(&key).unwrap_or_default();
    let handle = registry::allocate_handle(ViewEntry {
        native,
        key: key.clone(),
        kind,
        scope: Some(scope),
    });

    let mask = registration.mask();
    if !mask.is_empty() {
        with_host(|h| h.listen(native, mask))?;
    }

    let on_init = registration.on_init.clone();
    REGISTRY.with(|reg| {
        let mut reg = reg.borrow_mut();
        if registration.observe.is_some() {
            reg.observers.insert(handle);
        }
        reg.bindings.insert(handle, registration);
    });
    trace!(%key, %handle, "bound");

    if let Some(on_init) = on_init {
        let store = mount::store()?;
        let event = Value::empty_map();
        store.write(|global| {
            let local = scope::resolve(Some(scope), global);
            on_init(global, &CallbackArgs { event: &event, local: &local });
        });
    }

    Ok(Some(handle))
}

/// Create a scope at `root` and bind every keyed view under it.
pub fn bind_subtree(root: NativeId, binding: ScopeBinding) -> Result<ScopeId> {
    let scope = scope::create_scope(root, binding);
    let nodes = with_host(|h| collect_subtree(h, root))?;
    for node in nodes {
        bind_view(node, scope)?;
    }
    Ok(scope)
}

/// Tear down everything bound to one view: callbacks, observer membership,
/// cached properties and the handle itself.
pub fn dispose(handle: ViewHandle) -> bool {
    let was_bound = REGISTRY.with(|reg| {
        let mut reg = reg.borrow_mut();
        reg.observers.remove(&handle);
        reg.bindings.remove(&handle).is_some()
    });
    cache::release(handle);
    registry::release_handle(handle);
    was_bound
}

/// Dispose every bound view under `root` (inclusive) and drop the scopes
/// rooted there. Call before the host detaches the subtree.
pub fn release_subtree(root: NativeId) -> Result<usize> {
    let nodes = with_host(|h| collect_subtree(h, root))?;
    let mut released = 0;
    for node in nodes {
        if let Some(handle) = registry::get_handle(node) {
            dispose(handle);
            released += 1;
        }
        scope::release_root(node);
    }
    Ok(released)
}

pub fn bind_state(handle: ViewHandle) -> BindState {
    let bound = REGISTRY.with(|reg| reg.borrow().bindings.contains_key(&handle));
    if bound {
        BindState::Bound
    } else if registry::was_released(handle) {
        BindState::Disposed
    } else {
        BindState::Unbound
    }
}

// =============================================================================
// OBSERVERS
// =============================================================================

/// Observed views, in stable order.
pub fn observers() -> Vec<ViewHandle> {
    REGISTRY.with(|reg| reg.borrow().observers.iter().copied().collect())
}

pub fn observer_count() -> usize {
    REGISTRY.with(|reg| reg.borrow().observers.len())
}

/// Run the observer bound to `handle` against `global`.
///
/// Views disposed earlier in the same pass are skipped.
pub fn run_observer(handle: ViewHandle, global: &Value) -> Result<()> {
    let Some(entry) = registry::get_entry(handle) else {
        return Ok(());
    };
    let observe = REGISTRY.with(|reg| {
        reg.borrow()
            .bindings
            .get(&handle)
            .and_then(|binding| binding.observe.clone())
    });
    let Some(observe) = observe else {
        return Ok(());
    };

    let local = scope::resolve(entry.scope, global);
    let component = Component::new(handle, &entry);
    observe(&component, &local, global)
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Dispatch a native signal for `native`.
///
/// Must be called on the UI thread. Accepted signals hand their callback to
/// the runtime, which runs it and then an update pass.
pub fn dispatch(native: NativeId, signal: NativeSignal) -> Result<Dispatch> {
    let Some(handle) = registry::get_handle(native) else {
        return Ok(Dispatch::Ignored);
    };
    let Some(entry) = registry::get_entry(handle) else {
        return Ok(Dispatch::Ignored);
    };
    let binding = REGISTRY.with(|reg| reg.borrow().bindings.get(&handle).cloned());
    let Some(binding) = binding else {
        return Ok(Dispatch::Ignored);
    };

    match signal {
        NativeSignal::Click => interaction(&entry, binding.on_click, "onClick"),
        NativeSignal::LongPress => interaction(&entry, binding.on_context, "onLongClick"),
        NativeSignal::Enter => interaction(&entry, binding.on_enter, "onEnter"),
        NativeSignal::TextChanged(text) => {
            change(handle, &entry, binding.on_change, Value::String(text), "onChange Input")
        }
        NativeSignal::CheckedChanged(checked) => {
            change(handle, &entry, binding.on_change, Value::Bool(checked), "onChange Checkbox")
        }
        NativeSignal::ItemSelected(position) => {
            let selected = cache::get(handle, PropertyKey::Data).and_then(|data| {
                data.as_list()?
                    .get(position)?
                    .identifier()
                    .cloned()
            });
            match selected {
                Some(id) => change(handle, &entry, binding.on_change, id, "onChange Select"),
                None => Ok(Dispatch::Ignored),
            }
        }
        NativeSignal::LayoutChanged { old, new } => resize(&entry, binding.on_resize, old, new),
    }
}

fn interaction(entry: &ViewEntry, callback: Option<Callback>, reason: &str) -> Result<Dispatch> {
    let Some(callback) = callback else {
        return Ok(Dispatch::Ignored);
    };
    let accepted = REGISTRY.with(|reg| reg.borrow_mut().debouncer.accept(Instant::now()));
    if !accepted {
        debug!(view = %entry.key, reason, "interaction inside de-bounce window; dropped");
        return Ok(Dispatch::Dropped);
    }

    host::apply(entry.native, Mutation::HideKeyboard)?;
    mount::hand_off(callback, Value::empty_map(), entry.scope, reason)?;
    Ok(Dispatch::Accepted)
}

fn change(
    handle: ViewHandle,
    entry: &ViewEntry,
    callback: Option<Callback>,
    value: Value,
    reason: &str,
) -> Result<Dispatch> {
    let Some(callback) = callback else {
        return Ok(Dispatch::Ignored);
    };
    if cache::get(handle, PropertyKey::Value).as_ref() == Some(&value) {
        return Ok(Dispatch::Suppressed);
    }

    // The control already shows the new value; the next observer pass
    // setting the same value must not push it back.
    cache::store(handle, PropertyKey::Value, value.clone());
    let event = Value::map([("value", value)]);
    mount::hand_off(callback, event, entry.scope, reason)?;
    Ok(Dispatch::Accepted)
}

fn resize(entry: &ViewEntry, callback: Option<Callback>, old: Size, new: Size) -> Result<Dispatch> {
    let Some(callback) = callback else {
        return Ok(Dispatch::Ignored);
    };
    if old == new {
        return Ok(Dispatch::Suppressed);
    }

    let density = with_host(|h| h.density())?;
    let event = Value::map([
        ("width", Value::from(new.width / density)),
        ("height", Value::from(new.height / density)),
    ]);
    mount::hand_off(callback, event, entry.scope, "onResize")?;
    Ok(Dispatch::Accepted)
}

// =============================================================================
// CLEANUP
// =============================================================================

/// Drop every per-view binding and the observer set. Registrations stay on
/// file for the next mount.
pub(crate) fn unbind_all() {
    REGISTRY.with(|reg| {
        let mut reg = reg.borrow_mut();
        reg.bindings.clear();
        reg.observers.clear();
    });
}

/// Reset all registrations, bindings and de-bounce state (for testing).
pub fn reset_events() {
    REGISTRY.with(|reg| *reg.borrow_mut() = EventRegistry::new());
}

// =============================================================================
// TESTS
// =============================================================================
