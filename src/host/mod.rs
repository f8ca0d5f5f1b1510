//! Host boundary - the native view tree the runtime drives.
//!
//! The runtime never owns native views. It reads structure through
//! [`ViewTree`] and changes views only by sending [`Mutation`]s, always on
//! the thread the host was installed on.

pub mod memory;

use std::cell::RefCell;

use tracing::trace;

use crate::error::{Error, Result};
use crate::types::{Margins, NativeId, Rgba, SelectOption, ViewKey, ViewKind};

// =============================================================================
// Event Mask
// =============================================================================

bitflags::bitflags! {
    /// Native listeners a bound view needs.
    ///
    /// Combine with bitwise OR: `EventMask::CLICK | EventMask::CHANGE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMask: u8 {
        const NONE = 0;
        const CLICK = 1 << 0;
        const CONTEXT = 1 << 1;
        const ENTER = 1 << 2;
        const CHANGE = 1 << 3;
        const RESIZE = 1 << 4;
    }
}

// =============================================================================
// Mutations
// =============================================================================

/// One change to a native view.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    SetEnabled(bool),
    RequestFocus,
    ShowKeyboard,
    HideKeyboard,
    SetAlpha(f32),
    SetTranslationX(f32),
    SetVisible(bool),
    SetText(String),
    SetTextColor(Rgba),
    SetContentDescription(String),
    /// Image resource name, e.g. `ic_logo`.
    SetImage(String),
    SetBackgroundTint(Rgba),
    SetMargins(Margins),
    /// Width in device pixels.
    SetWidth(i32),
    /// Height in device pixels.
    SetHeight(i32),
    SetInputText(String),
    SetChecked(bool),
    SetOptions(Vec<SelectOption>),
    SetSelection(usize),
}

// =============================================================================
// ViewTree
// =============================================================================

/// A native view tree.
///
/// Implementations own the nodes; the runtime only holds [`NativeId`]s.
pub trait ViewTree {
    /// Declared key of a node. Keyless nodes are structural only.
    fn key(&self, node: NativeId) -> Option<ViewKey>;

    fn kind(&self, node: NativeId) -> ViewKind;

    /// Children in display order.
    fn children(&self, node: NativeId) -> Vec<NativeId>;

    /// Instantiate `template` as a child of `parent` at `index`.
    ///
    /// `index` is already clamped to the child count. Returns `None` if the
    /// template does not exist.
    fn inflate(&mut self, parent: NativeId, template: &str, index: usize) -> Option<NativeId>;

    /// Detach the child at `index` from `parent`.
    fn remove_child(&mut self, parent: NativeId, index: usize) -> Option<NativeId>;

    fn apply(&mut self, node: NativeId, mutation: Mutation);

    /// Device pixels per logical unit.
    fn density(&self) -> f32 {
        1.0
    }

    /// Current laid-out width of a node, in device pixels.
    fn measured_width(&self, _node: NativeId) -> f32 {
        0.0
    }

    /// Attach native listeners for the given events.
    fn listen(&mut self, _node: NativeId, _events: EventMask) {}
}

// =============================================================================
// Installed Host
// =============================================================================

thread_local! {
    static HOST: RefCell<Option<Box<dyn ViewTree>>> = RefCell::new(None);
}

pub fn install_host(host: Box<dyn ViewTree>) -> Result<()> {
    HOST.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(Error::AlreadyMounted);
        }
        *slot = Some(host);
        Ok(())
    })
}

pub fn uninstall_host() -> Option<Box<dyn ViewTree>> {
    HOST.with(|slot| slot.borrow_mut().take())
}

pub fn is_installed() -> bool {
    HOST.with(|slot| slot.borrow().is_some())
}

/// Run `f` against the installed host.
///
/// Calls must not nest: hosts never call back into the runtime, and runtime
/// code releases the host before invoking application callbacks.
pub fn with_host<R>(f: impl FnOnce(&mut dyn ViewTree) -> R) -> Result<R> {
    HOST.with(|slot| {
        let mut slot = slot.borrow_mut();
        let host = slot.as_deref_mut().ok_or(Error::NotMounted)?;
        Ok(f(host))
    })
}

/// Send one mutation to a node.
pub fn apply(node: NativeId, mutation: Mutation) -> Result<()> {
    trace!(%node, ?mutation, "apply");
    with_host(|host| host.apply(node, mutation))
}

/// Every node under `root`, `root` first, depth-first in display order.
pub fn collect_subtree(host: &dyn ViewTree, root: NativeId) -> Vec<NativeId> {
    let mut nodes = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        nodes.push(node);
        let children = host.children(node);
        stack.extend(children.into_iter().rev());
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::memory::{MemoryTree, Template};
    use super::*;

    fn reset() {
        uninstall_host();
    }

    #[test]
    fn test_with_host_requires_install() {
        reset();
        assert!(matches!(with_host(|_| ()), Err(Error::NotMounted)));
    }

    #[test]
    fn test_install_twice_fails() {
        reset();
        install_host(Box::new(MemoryTree::new())).unwrap();
        assert!(matches!(
            install_host(Box::new(MemoryTree::new())),
            Err(Error::AlreadyMounted)
        ));
        assert!(uninstall_host().is_some());
        assert!(!is_installed());
    }

    #[test]
    fn test_collect_subtree_order() {
        let tree = MemoryTree::new();
        let root = tree.build(
            &Template::container("root")
                .child(Template::text("a"))
                .child(Template::container("b").child(Template::text("c")))
                .child(Template::text("d")),
        );

        let keys: Vec<String> = collect_subtree(&tree, root)
            .into_iter()
            .map(|n| tree.key(n).map(|k| k.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(keys, vec!["root", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_apply_reaches_host() {
        reset();
        let tree = MemoryTree::new();
        let node = tree.build(&Template::text("title"));
        install_host(Box::new(tree.clone())).unwrap();

        apply(node, Mutation::SetText("hi".into())).unwrap();
        assert_eq!(tree.mutations_for(node), vec![Mutation::SetText("hi".into())]);
        uninstall_host();
    }
}
