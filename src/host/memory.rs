//! In-memory view tree.
//!
//! A headless [`ViewTree`] that records every mutation it receives. It is the
//! host the test suites drive, and a reference for what a real host has to
//! provide: node structure, named templates for list items, density, and the
//! current state of each node after mutations.
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::host::memory::{MemoryTree, Template};
//!
//! let tree = MemoryTree::new();
//! tree.register_template("items_adapter", Template::container("row").child(Template::text("label")));
//! let root = tree.build(&Template::container("root").child(Template::container("items")));
//!
//! let items = tree.find("items").unwrap();
//! assert!(tree.children_of(items).is_empty());
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::{EventMask, Mutation, ViewTree};
use crate::types::{Margins, NativeId, Rgba, SelectOption, ViewKey, ViewKind};

// =============================================================================
// Templates
// =============================================================================

/// Blueprint of a subtree, instantiated by [`MemoryTree::build`] and by
/// `inflate` for registered templates.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    key: Option<String>,
    kind: ViewKind,
    width: f32,
    children: Vec<Template>,
}

impl Template {
    pub fn new(kind: ViewKind, key: Option<&str>) -> Self {
        Self {
            key: key.map(str::to_string),
            kind,
            width: 0.0,
            children: Vec::new(),
        }
    }

    pub fn container(key: &str) -> Self {
        Self::new(ViewKind::Container, Some(key))
    }

    pub fn text(key: &str) -> Self {
        Self::new(ViewKind::Text, Some(key))
    }

    pub fn button(key: &str) -> Self {
        Self::new(ViewKind::Button, Some(key))
    }

    pub fn input(key: &str) -> Self {
        Self::new(ViewKind::Input, Some(key))
    }

    pub fn checkbox(key: &str) -> Self {
        Self::new(ViewKind::Checkbox, Some(key))
    }

    pub fn select(key: &str) -> Self {
        Self::new(ViewKind::Select, Some(key))
    }

    pub fn image(key: &str) -> Self {
        Self::new(ViewKind::Image, Some(key))
    }

    /// A node without a key. It is never bound, but its children are.
    pub fn keyless(kind: ViewKind) -> Self {
        Self::new(kind, None)
    }

    pub fn child(mut self, child: Template) -> Self {
        self.children.push(child);
        self
    }

    /// Measured width in device pixels.
    pub fn width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }
}

// =============================================================================
// Node State
// =============================================================================

/// Observable state of a node after all mutations so far.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProps {
    pub enabled: bool,
    pub focused: bool,
    pub alpha: f32,
    pub translation_x: f32,
    pub visible: bool,
    pub text: String,
    pub text_color: Option<Rgba>,
    pub content_description: Option<String>,
    pub image: Option<String>,
    pub background_tint: Option<Rgba>,
    pub margins: Margins,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub checked: bool,
    pub options: Vec<SelectOption>,
    pub selection: Option<usize>,
}

impl Default for NodeProps {
    fn default() -> Self {
        Self {
            enabled: true,
            focused: false,
            alpha: 1.0,
            translation_x: 0.0,
            visible: true,
            text: String::new(),
            text_color: None,
            content_description: None,
            image: None,
            background_tint: None,
            margins: Margins::default(),
            width: None,
            height: None,
            checked: false,
            options: Vec::new(),
            selection: None,
        }
    }
}

impl NodeProps {
    fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::SetEnabled(enabled) => self.enabled = *enabled,
            Mutation::RequestFocus => self.focused = true,
            Mutation::ShowKeyboard | Mutation::HideKeyboard => {}
            Mutation::SetAlpha(alpha) => self.alpha = *alpha,
            Mutation::SetTranslationX(x) => self.translation_x = *x,
            Mutation::SetVisible(visible) => self.visible = *visible,
            Mutation::SetText(text) | Mutation::SetInputText(text) => self.text = text.clone(),
            Mutation::SetTextColor(color) => self.text_color = Some(*color),
            Mutation::SetContentDescription(text) => self.content_description = Some(text.clone()),
            Mutation::SetImage(name) => self.image = Some(name.clone()),
            Mutation::SetBackgroundTint(color) => self.background_tint = Some(*color),
            Mutation::SetMargins(margins) => self.margins = *margins,
            Mutation::SetWidth(width) => self.width = Some(*width),
            Mutation::SetHeight(height) => self.height = Some(*height),
            Mutation::SetChecked(checked) => self.checked = *checked,
            Mutation::SetOptions(options) => self.options = options.clone(),
            Mutation::SetSelection(index) => self.selection = Some(*index),
        }
    }
}

#[derive(Debug)]
struct Node {
    key: Option<ViewKey>,
    kind: ViewKind,
    parent: Option<NativeId>,
    children: Vec<NativeId>,
    measured_width: f32,
    listening: EventMask,
    props: NodeProps,
}

#[derive(Debug)]
struct Inner {
    nodes: BTreeMap<NativeId, Node>,
    next_id: u64,
    templates: HashMap<String, Template>,
    log: Vec<(NativeId, Mutation)>,
    density: f32,
    keyboard_visible: bool,
}

impl Inner {
    fn instantiate(&mut self, template: &Template, parent: Option<NativeId>) -> NativeId {
        self.next_id += 1;
        let id = NativeId(self.next_id);
        self.nodes.insert(
            id,
            Node {
                key: template.key.as_deref().map(ViewKey::from),
                kind: template.kind,
                parent,
                children: Vec::new(),
                measured_width: template.width,
                listening: EventMask::NONE,
                props: NodeProps::default(),
            },
        );
        let children: Vec<NativeId> = template
            .children
            .iter()
            .map(|child| self.instantiate(child, Some(id)))
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children;
        }
        id
    }

    fn drop_subtree(&mut self, root: NativeId) {
        if let Some(node) = self.nodes.remove(&root) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }
}

// =============================================================================
// MemoryTree
// =============================================================================

/// Shared handle to an in-memory tree. Clones observe the same nodes, so a
/// test can keep one clone while the runtime owns another.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    inner: Rc<RefCell<Inner>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::with_density(1.0)
    }

    pub fn with_density(density: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                nodes: BTreeMap::new(),
                next_id: 0,
                templates: HashMap::new(),
                log: Vec::new(),
                density,
                keyboard_visible: false,
            })),
        }
    }

    /// Make `template` available to `inflate` under `name`.
    pub fn register_template(&self, name: &str, template: Template) {
        self.inner
            .borrow_mut()
            .templates
            .insert(name.to_string(), template);
    }

    /// Instantiate a detached subtree and return its root.
    pub fn build(&self, template: &Template) -> NativeId {
        self.inner.borrow_mut().instantiate(template, None)
    }

    /// First live node with `key`, in creation order.
    pub fn find(&self, key: &str) -> Option<NativeId> {
        self.find_all(key).into_iter().next()
    }

    /// Every live node with `key`, in creation order.
    pub fn find_all(&self, key: &str) -> Vec<NativeId> {
        self.inner
            .borrow()
            .nodes
            .iter()
            .filter(|(_, node)| node.key.as_ref().is_some_and(|k| k.as_str() == key))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Descendant of `root` with `key`, depth-first.
    pub fn find_in(&self, root: NativeId, key: &str) -> Option<NativeId> {
        super::collect_subtree(self, root)
            .into_iter()
            .find(|node| self.key(*node).is_some_and(|k| k.as_str() == key))
    }

    pub fn children_of(&self, node: NativeId) -> Vec<NativeId> {
        self.children(node)
    }

    pub fn parent(&self, node: NativeId) -> Option<NativeId> {
        self.inner.borrow().nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn contains(&self, node: NativeId) -> bool {
        self.inner.borrow().nodes.contains_key(&node)
    }

    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    pub fn props(&self, node: NativeId) -> Option<NodeProps> {
        self.inner.borrow().nodes.get(&node).map(|n| n.props.clone())
    }

    pub fn listening(&self, node: NativeId) -> EventMask {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.listening)
            .unwrap_or_default()
    }

    pub fn set_measured_width(&self, node: NativeId, width: f32) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.measured_width = width;
        }
    }

    pub fn keyboard_visible(&self) -> bool {
        self.inner.borrow().keyboard_visible
    }

    /// Every mutation received so far, in order.
    pub fn mutations(&self) -> Vec<(NativeId, Mutation)> {
        self.inner.borrow().log.clone()
    }

    pub fn mutations_for(&self, node: NativeId) -> Vec<Mutation> {
        self.inner
            .borrow()
            .log
            .iter()
            .filter(|(id, _)| *id == node)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn clear_mutations(&self) {
        self.inner.borrow_mut().log.clear();
    }
}

impl ViewTree for MemoryTree {
    fn key(&self, node: NativeId) -> Option<ViewKey> {
        self.inner.borrow().nodes.get(&node).and_then(|n| n.key.clone())
    }

    fn kind(&self, node: NativeId) -> ViewKind {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.kind)
            .unwrap_or_default()
    }

    fn children(&self, node: NativeId) -> Vec<NativeId> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn inflate(&mut self, parent: NativeId, template: &str, index: usize) -> Option<NativeId> {
        let mut inner = self.inner.borrow_mut();
        let template = inner.templates.get(template)?.clone();
        if !inner.nodes.contains_key(&parent) {
            return None;
        }
        let child = inner.instantiate(&template, Some(parent));
        let node = inner.nodes.get_mut(&parent)?;
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        Some(child)
    }

    fn remove_child(&mut self, parent: NativeId, index: usize) -> Option<NativeId> {
        let mut inner = self.inner.borrow_mut();
        let node = inner.nodes.get_mut(&parent)?;
        if index >= node.children.len() {
            return None;
        }
        let child = node.children.remove(index);
        inner.drop_subtree(child);
        Some(child)
    }

    fn apply(&mut self, node: NativeId, mutation: Mutation) {
        let mut inner = self.inner.borrow_mut();
        match mutation {
            Mutation::ShowKeyboard => inner.keyboard_visible = true,
            Mutation::HideKeyboard => inner.keyboard_visible = false,
            _ => {}
        }
        if let Some(n) = inner.nodes.get_mut(&node) {
            n.props.apply(&mutation);
        }
        inner.log.push((node, mutation));
    }

    fn density(&self) -> f32 {
        self.inner.borrow().density
    }

    fn measured_width(&self, node: NativeId) -> f32 {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.measured_width)
            .unwrap_or(0.0)
    }

    fn listen(&mut self, node: NativeId, events: EventMask) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.listening |= events;
        }
    }
}
