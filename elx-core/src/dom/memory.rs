//! In-memory document.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::node::{Node, NodeId};
use super::{
    activates_on_enter, Disposition, Document, DomEvent, EventKind, InsertPosition, Listener,
};
use crate::util::html_decode;

#[derive(Debug)]
struct Tree {
    nodes: Vec<Node>,
    active: Option<NodeId>,
}

impl Tree {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.raw() as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.raw() as usize)
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.node_mut(child).and_then(|node| node.parent.take());
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.remove_child(child);
        }
    }

    /// Insert an opaque markup fragment at `index` among `parent`'s children.
    fn insert_fragment(&mut self, parent: NodeId, index: usize, html: &str) {
        let id = NodeId::from(self.nodes.len() as u64);
        let mut fragment = Node::new(MemoryDocument::FRAGMENT);
        fragment.html = html.to_string();
        fragment.parent = Some(parent);
        self.nodes.push(fragment);
        if let Some(node) = self.node_mut(parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, id);
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == MemoryDocument::BODY {
                return true;
            }
            current = self.node(node_id).and_then(|node| node.parent);
        }
        false
    }
}

/// A single-threaded DOM kept entirely in memory.
///
/// The document owns a `<body>` root. Elements are created detached and
/// become part of the document once appended under the body. Every write
/// through the [`Document`] trait bumps a mutation counter so callers can
/// observe redundant writes.
///
/// Markup is never parsed. Inner HTML is stored as a string, and markup
/// inserted next to elements becomes a `#fragment` node holding it.
pub struct MemoryDocument {
    tree: RefCell<Tree>,
    listeners: RefCell<HashMap<(NodeId, EventKind), Listener>>,
    window_listener: RefCell<Option<Listener>>,
    mutations: Cell<usize>,
}

impl MemoryDocument {
    const BODY: NodeId = NodeId(0);

    /// Tag name of nodes created by [`Document::insert_adjacent_html`].
    pub const FRAGMENT: &'static str = "#fragment";

    /// Create a document containing only an empty body.
    pub fn new() -> Self {
        Self {
            tree: RefCell::new(Tree {
                nodes: vec![Node::new("body")],
                active: None,
            }),
            listeners: RefCell::new(HashMap::new()),
            window_listener: RefCell::new(None),
            mutations: Cell::new(0),
        }
    }

    /// The body root every connected element hangs under.
    pub fn body(&self) -> NodeId {
        Self::BODY
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut tree = self.tree.borrow_mut();
        tree.nodes.push(Node::new(tag));
        NodeId::from((tree.nodes.len() - 1) as u64)
    }

    /// Create an element with attributes and append it under `parent`.
    pub fn create_child(&self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let el = self.create_element(tag);
        {
            let mut tree = self.tree.borrow_mut();
            if let Some(node) = tree.node_mut(el) {
                for (name, value) in attributes {
                    node.set_attribute(name, value);
                }
            }
        }
        self.append_child(parent, el);
        el
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut tree = self.tree.borrow_mut();
        if tree.node(parent).is_none() || tree.node(child).is_none() {
            return;
        }
        tree.detach(child);
        if let Some(node) = tree.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = tree.node_mut(parent) {
            node.children.push(child);
        }
    }

    /// Detach `el` (and its subtree) from the document.
    pub fn remove(&self, el: NodeId) {
        let mut tree = self.tree.borrow_mut();
        tree.detach(el);
        if tree.active.is_some_and(|active| !tree.is_connected(active)) {
            tree.active = None;
        }
    }

    /// Child nodes of `el` in document order.
    pub fn children(&self, el: NodeId) -> Vec<NodeId> {
        self.read(el, |node| node.children.to_vec()).unwrap_or_default()
    }

    /// Decoded text of a leaf element.
    pub fn text(&self, el: NodeId) -> String {
        html_decode(&self.inner_html(el))
    }

    /// Number of writes performed through the [`Document`] trait.
    pub fn mutations(&self) -> usize {
        self.mutations.get()
    }

    /// Dispatch `event` at `target`.
    ///
    /// Bubbling events walk up the ancestor chain until a listener stops
    /// propagation. Keydown events that were not stopped finally reach the
    /// window listener.
    pub fn dispatch(&self, target: NodeId, event: &DomEvent) -> Disposition {
        let mut disposition = Disposition::PASS;
        let mut current = Some(target);

        while let Some(el) = current {
            let listener = self.listeners.borrow().get(&(el, event.kind)).cloned();
            if let Some(listener) = listener {
                disposition = disposition.merge(listener(event));
            }
            if disposition.stop_propagation || !event.kind.bubbles() {
                break;
            }
            current = self.tree.borrow().node(el).and_then(|node| node.parent);
        }

        if event.kind == EventKind::KeyDown && !disposition.stop_propagation {
            disposition = disposition.merge(self.dispatch_window(event));
        }
        disposition
    }

    /// Simulate a click on `el`.
    pub fn click(&self, el: NodeId) -> Disposition {
        self.dispatch(el, &DomEvent::new(EventKind::Click))
    }

    /// Simulate a key press on the focused element, or the window if none.
    ///
    /// Enter on a button or link that nobody prevented also clicks it, as a
    /// browser would.
    pub fn press_key(&self, event: &DomEvent) -> Disposition {
        let Some(active) = self.active_element() else {
            return self.dispatch_window(event);
        };
        let disposition = self.dispatch(active, event);
        let enter = event
            .key
            .as_deref()
            .is_some_and(|key| key.eq_ignore_ascii_case("enter"));
        if enter && !disposition.prevent_default && activates_on_enter(self, active) {
            self.click(active);
        }
        disposition
    }

    fn dispatch_window(&self, event: &DomEvent) -> Disposition {
        let listener = self.window_listener.borrow().clone();
        match listener {
            Some(listener) => listener(event),
            None => Disposition::PASS,
        }
    }

    fn write<F>(&self, el: NodeId, f: F)
    where
        F: FnOnce(&mut Node),
    {
        self.mutations.set(self.mutations.get() + 1);
        if let Some(node) = self.tree.borrow_mut().node_mut(el) {
            f(node);
        }
    }

    fn read<T, F>(&self, el: NodeId, f: F) -> Option<T>
    where
        F: FnOnce(&Node) -> T,
    {
        self.tree.borrow().node(el).map(f)
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let tree = self.tree.borrow();
        (0..tree.nodes.len())
            .map(|index| NodeId::from(index as u64))
            .find(|el| {
                tree.node(*el).and_then(|node| node.attribute("id")) == Some(id)
                    && tree.is_connected(*el)
            })
    }

    fn attributes(&self, el: NodeId) -> Vec<(String, String)> {
        self.read(el, |node| node.attributes.clone()).unwrap_or_default()
    }

    fn attribute(&self, el: NodeId, name: &str) -> Option<String> {
        self.read(el, |node| node.attribute(name).map(str::to_string))
            .flatten()
    }

    fn set_attribute(&self, el: NodeId, name: &str, value: &str) {
        self.write(el, |node| {
            node.set_attribute(name, value);
        });
    }

    fn remove_attribute(&self, el: NodeId, name: &str) {
        self.write(el, |node| {
            node.remove_attribute(name);
        });
    }

    fn class_name(&self, el: NodeId) -> String {
        self.attribute(el, "class").unwrap_or_default()
    }

    fn set_class_name(&self, el: NodeId, value: &str) {
        self.set_attribute(el, "class", value);
    }

    fn tag_name(&self, el: NodeId) -> String {
        self.read(el, |node| node.tag.clone()).unwrap_or_default()
    }

    fn value(&self, el: NodeId) -> String {
        self.read(el, |node| node.value.clone()).unwrap_or_default()
    }

    fn set_value(&self, el: NodeId, value: &str) {
        self.write(el, |node| node.value = value.to_string());
    }

    fn checked(&self, el: NodeId) -> bool {
        self.read(el, |node| node.checked).unwrap_or(false)
    }

    fn set_checked(&self, el: NodeId, checked: bool) {
        self.write(el, |node| node.checked = checked);
    }

    fn child_element_count(&self, el: NodeId) -> usize {
        self.read(el, |node| node.children.len()).unwrap_or(0)
    }

    fn inner_html(&self, el: NodeId) -> String {
        self.read(el, |node| node.html.clone()).unwrap_or_default()
    }

    fn set_inner_html(&self, el: NodeId, html: &str) {
        self.mutations.set(self.mutations.get() + 1);
        let mut tree = self.tree.borrow_mut();
        let children = match tree.node_mut(el) {
            Some(node) => {
                node.html = html.to_string();
                std::mem::take(&mut node.children)
            }
            None => return,
        };
        for child in children {
            if let Some(node) = tree.node_mut(child) {
                node.parent = None;
            }
        }
    }

    fn insert_adjacent_html(&self, el: NodeId, position: InsertPosition, html: &str) {
        let mut tree = self.tree.borrow_mut();
        let Some((parent, child_count)) = tree.node(el).map(|n| (n.parent, n.children.len())) else {
            return;
        };
        match position {
            InsertPosition::AfterBegin | InsertPosition::BeforeEnd if child_count == 0 => {
                if let Some(node) = tree.node_mut(el) {
                    if position == InsertPosition::AfterBegin {
                        node.html.insert_str(0, html);
                    } else {
                        node.html.push_str(html);
                    }
                }
            }
            InsertPosition::AfterBegin => tree.insert_fragment(el, 0, html),
            InsertPosition::BeforeEnd => tree.insert_fragment(el, child_count, html),
            InsertPosition::BeforeBegin | InsertPosition::AfterEnd => {
                let Some(parent) = parent else {
                    return;
                };
                let Some(index) = tree
                    .node(parent)
                    .and_then(|node| node.children.iter().position(|child| *child == el))
                else {
                    return;
                };
                let index = match position {
                    InsertPosition::AfterEnd => index + 1,
                    _ => index,
                };
                tree.insert_fragment(parent, index, html);
            }
        }
        self.mutations.set(self.mutations.get() + 1);
    }

    fn remove_element(&self, el: NodeId) {
        if self.read(el, |node| node.parent.is_some()) == Some(true) {
            self.mutations.set(self.mutations.get() + 1);
            self.remove(el);
        }
    }

    fn is_connected(&self, el: NodeId) -> bool {
        self.tree.borrow().is_connected(el)
    }

    fn focus(&self, el: NodeId) {
        let previous = {
            let mut tree = self.tree.borrow_mut();
            if tree.active == Some(el) || !tree.is_connected(el) {
                return;
            }
            tree.active.replace(el)
        };
        if let Some(previous) = previous {
            self.dispatch(previous, &DomEvent::new(EventKind::Blur));
        }
        self.dispatch(el, &DomEvent::new(EventKind::Focus));
    }

    fn active_element(&self) -> Option<NodeId> {
        self.tree.borrow().active
    }

    fn set_listener(&self, el: NodeId, kind: EventKind, listener: Listener) {
        self.listeners.borrow_mut().insert((el, kind), listener);
    }

    fn has_listener(&self, el: NodeId, kind: EventKind) -> bool {
        self.listeners.borrow().contains_key(&(el, kind))
    }

    fn set_window_listener(&self, listener: Listener) {
        *self.window_listener.borrow_mut() = Some(listener);
    }
}
