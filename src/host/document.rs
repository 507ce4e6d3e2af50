//! Document - The host node tree components render into.
//!
//! An arena of element and text nodes addressed by [`NodeId`], plus per-node
//! event listeners. It plays the part a browser document plays for a web UI:
//! containers are looked up in it, templates are materialized into it, and
//! events are dispatched through it.
//!
//! # Identity
//!
//! Node ids are allocated from a monotonically increasing counter and never
//! reused. A removed node stays gone, so "the previous root is no longer in
//! the tree" is directly checkable with [`Document::contains`].
//!
//! # Listener invocation
//!
//! `dispatch_event` snapshots the listeners of each node on the propagation
//! path and runs them with no borrow of the document held, so a listener may
//! freely mutate the tree (including re-rendering the component it belongs to).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::event::{EventFlags, HostEvent};
use super::markup::{self, MarkupNode, escape_attribute, escape_text};
use crate::error::{HostError, MarkupError};
use crate::utils::run_isolated;

// =============================================================================
// Types
// =============================================================================

/// Identifier of a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event listener callback.
pub type EventListener = Rc<dyn Fn(&HostEvent)>;

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct ListenerEntry {
    id: ListenerId,
    kind: String,
    listener: EventListener,
}

struct DocumentInner {
    nodes: HashMap<NodeId, NodeData>,
    listeners: HashMap<NodeId, Vec<ListenerEntry>>,
    body: NodeId,
    next_node: u64,
    next_listener: u64,
}

impl DocumentInner {
    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            NodeData {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, HostError> {
        self.nodes.get(&id).ok_or(HostError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, HostError> {
        self.nodes.get_mut(&id).ok_or(HostError::UnknownNode(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut IndexMap<String, String>, HostError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            NodeKind::Text(_) => Err(HostError::NotAnElement(id)),
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(&node).and_then(|data| data.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Unlink `child` from its current parent, if any.
    fn detach(&mut self, child: NodeId) {
        let parent = self.nodes.get(&child).and_then(|data| data.parent);
        if let Some(parent) = parent {
            if let Some(parent_data) = self.nodes.get_mut(&parent) {
                parent_data.children.retain(|&c| c != child);
            }
        }
        if let Some(data) = self.nodes.get_mut(&child) {
            data.parent = None;
        }
    }

    /// Free `node` and all its descendants, together with their listeners.
    fn free_subtree(&mut self, node: NodeId) -> usize {
        let mut stack = vec![node];
        let mut freed = 0;
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.remove(&id) {
                stack.extend(data.children);
                self.listeners.remove(&id);
                freed += 1;
            }
        }
        freed
    }

    fn build(&mut self, node: MarkupNode) -> NodeId {
        match node {
            MarkupNode::Text(text) => self.alloc(NodeKind::Text(text)),
            MarkupNode::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.alloc(NodeKind::Element {
                    tag,
                    attributes: attributes.into_iter().collect(),
                });
                for child in children {
                    let child_id = self.build(child);
                    if let Some(data) = self.nodes.get_mut(&child_id) {
                        data.parent = Some(id);
                    }
                    if let Some(data) = self.nodes.get_mut(&id) {
                        data.children.push(child_id);
                    }
                }
                id
            }
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// Handle to a host node tree. Cloning shares the tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("listeners", &inner.listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl Document {
    /// Create a document containing an empty `<body>`.
    pub fn new() -> Self {
        let mut inner = DocumentInner {
            nodes: HashMap::new(),
            listeners: HashMap::new(),
            body: NodeId(0),
            next_node: 0,
            next_listener: 0,
        };
        inner.body = inner.alloc(NodeKind::Element {
            tag: "body".to_string(),
            attributes: IndexMap::new(),
        });
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn body(&self) -> NodeId {
        self.inner.borrow().body
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.borrow_mut().alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
        })
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.borrow_mut().alloc(NodeKind::Text(text.to_string()))
    }

    /// Parse `markup` and build its first node, detached from the tree.
    ///
    /// Surrounding whitespace is trimmed before parsing. Nodes after the first
    /// are discarded. Returns `Ok(None)` for markup that produces no node.
    pub fn materialize(&self, markup: &str) -> Result<Option<NodeId>, MarkupError> {
        let nodes = markup::parse(markup.trim())?;
        let Some(first) = nodes.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(self.inner.borrow_mut().build(first)))
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Append `child` as the last child of `parent`, moving it if attached elsewhere.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        let mut inner = self.inner.borrow_mut();
        inner.element_mut(parent)?;
        inner.node(child)?;
        if inner.is_ancestor_or_self(child, parent) {
            return Err(HostError::HierarchyCycle { parent, child });
        }
        inner.detach(child);
        inner.node_mut(parent)?.children.push(child);
        inner.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Put `new_child` where `old_child` is under `parent`. `old_child` is
    /// detached but not freed.
    pub fn replace_child(
        &self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> Result<(), HostError> {
        let mut inner = self.inner.borrow_mut();
        inner.node(new_child)?;
        let position = inner
            .node(parent)?
            .children
            .iter()
            .position(|&c| c == old_child)
            .ok_or(HostError::NotAChild {
                parent,
                child: old_child,
            })?;
        if new_child == old_child {
            return Ok(());
        }
        if inner.is_ancestor_or_self(new_child, parent) {
            return Err(HostError::HierarchyCycle {
                parent,
                child: new_child,
            });
        }

        inner.detach(new_child);
        // Detaching may have shifted the position if both shared the parent.
        let position = inner
            .node(parent)?
            .children
            .iter()
            .position(|&c| c == old_child)
            .unwrap_or(position);
        inner.node_mut(parent)?.children[position] = new_child;
        inner.node_mut(new_child)?.parent = Some(parent);
        inner.node_mut(old_child)?.parent = None;
        Ok(())
    }

    /// Unlink `node` from its parent. The node and its subtree stay alive and
    /// can be attached again.
    pub fn detach(&self, node: NodeId) {
        self.inner.borrow_mut().detach(node);
    }

    /// Detach `node` and free it with its whole subtree and their listeners.
    ///
    /// Returns the number of nodes freed (0 if `node` was already gone).
    pub fn remove_node(&self, node: NodeId) -> usize {
        let mut inner = self.inner.borrow_mut();
        inner.detach(node);
        inner.free_subtree(node)
    }

    /// Remove and free all children of `node`.
    pub fn clear_children(&self, node: NodeId) -> Result<(), HostError> {
        let children = self.children(node)?;
        for child in children {
            self.remove_node(child);
        }
        Ok(())
    }

    /// True if `node` exists in this document (attached or not).
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.borrow().nodes.contains_key(&node)
    }

    /// True if `node` is attached under the body.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let inner = self.inner.borrow();
        inner.nodes.contains_key(&node) && inner.is_ancestor_or_self(inner.body, node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(&node).and_then(|data| data.parent)
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, HostError> {
        Ok(self.inner.borrow().node(node)?.children.clone())
    }

    /// Number of live nodes, including the body.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    // -------------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------------

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.borrow().nodes.get(&node).map(|data| data.kind.clone())
    }

    /// Tag name of an element; `None` for text nodes and unknown ids.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        self.inner
            .borrow_mut()
            .element_mut(node)?
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, HostError> {
        Ok(self.inner.borrow_mut().element_mut(node)?.shift_remove(name))
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(data) = inner.nodes.get(&id) else {
                continue;
            };
            if let NodeKind::Text(text) = &data.kind {
                out.push_str(text);
            }
            stack.extend(data.children.iter().rev());
        }
        out
    }

    /// Replace the children of `node` with a single text node.
    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), HostError> {
        self.clear_children(node)?;
        let text_node = self.create_text(text);
        self.append_child(node, text_node)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// First descendant of `root` (excluding `root`) with `name="value"`, in
    /// document order.
    pub fn find_by_attribute(&self, root: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.find_all_by_attribute(root, name, value).into_iter().next()
    }

    /// All descendants of `root` (excluding `root`) with `name="value"`, in
    /// document order.
    pub fn find_all_by_attribute(&self, root: NodeId, name: &str, value: &str) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = match inner.nodes.get(&root) {
            Some(data) => data.children.iter().rev().copied().collect(),
            None => return found,
        };
        while let Some(id) = stack.pop() {
            let Some(data) = inner.nodes.get(&id) else {
                continue;
            };
            if let NodeKind::Element { attributes, .. } = &data.kind {
                if attributes.get(name).is_some_and(|v| v == value) {
                    found.push(id);
                }
            }
            stack.extend(data.children.iter().rev());
        }
        found
    }

    /// Element attached under the body whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attribute(self.body(), "id", id)
    }

    /// Nearest of `node` and its ancestors that carries attribute `name`.
    pub fn closest_with_attribute(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let inner = self.inner.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            let data = inner.nodes.get(&id)?;
            if let NodeKind::Element { attributes, .. } = &data.kind {
                if attributes.contains_key(name) {
                    return Some(id);
                }
            }
            current = data.parent;
        }
        None
    }

    /// Serialize `node` and its subtree back to markup.
    pub fn to_markup(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        write_markup(&inner, node, &mut out);
        out
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Register `listener` for events of `kind` reaching `node`.
    pub fn add_event_listener(
        &self,
        node: NodeId,
        kind: &str,
        listener: impl Fn(&HostEvent) + 'static,
    ) -> Result<ListenerId, HostError> {
        let mut inner = self.inner.borrow_mut();
        inner.node(node)?;
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.entry(node).or_default().push(ListenerEntry {
            id,
            kind: kind.to_string(),
            listener: Rc::new(listener),
        });
        Ok(id)
    }

    /// Remove a listener. Returns false if it was already gone (for example
    /// because its node was removed).
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let mut removed = false;
        inner.listeners.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }

    /// Total number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.values().map(Vec::len).sum()
    }

    /// Dispatch `event` at its target.
    ///
    /// Listeners on the target run first; bubbling events then visit each
    /// ancestor until propagation is stopped. Returns the event so callers can
    /// inspect [`HostEvent::default_prevented`].
    pub fn dispatch_event(&self, event: HostEvent) -> HostEvent {
        let path: Vec<NodeId> = {
            let inner = self.inner.borrow();
            let mut path = Vec::new();
            let mut current = Some(event.target());
            while let Some(id) = current {
                let Some(data) = inner.nodes.get(&id) else {
                    break;
                };
                path.push(id);
                if !event.flags().contains(EventFlags::BUBBLES) {
                    break;
                }
                current = data.parent;
            }
            path
        };

        for node in path {
            let listeners: Vec<EventListener> = {
                let inner = self.inner.borrow();
                inner
                    .listeners
                    .get(&node)
                    .map(|entries| {
                        entries
                            .iter()
                            .filter(|entry| entry.kind == event.kind())
                            .map(|entry| Rc::clone(&entry.listener))
                            .collect()
                    })
                    .unwrap_or_default()
            };

            event.set_current_target(node);
            for listener in &listeners {
                run_isolated("host listener", event.kind(), || listener(&event));
            }
            if event.propagation_stopped() {
                break;
            }
        }
        event
    }

    /// Dispatch a bubbling, cancelable click at `node`.
    pub fn click(&self, node: NodeId) -> HostEvent {
        self.dispatch_event(HostEvent::click(node))
    }
}

fn write_markup(inner: &DocumentInner, node: NodeId, out: &mut String) {
    let Some(data) = inner.nodes.get(&node) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::Element { tag, attributes } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
            }
            out.push('>');
            for &child in &data.children {
                write_markup(inner, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn mounted(doc: &Document, markup: &str) -> NodeId {
        let node = doc.materialize(markup).unwrap().unwrap();
        doc.append_child(doc.body(), node).unwrap();
        node
    }

    #[test]
    fn test_materialize_takes_first_node() {
        let doc = Document::new();
        let before = doc.node_count();
        let node = doc
            .materialize("  <div id=\"a\"><b>x</b></div><p>ignored</p>  ")
            .unwrap()
            .unwrap();

        assert_eq!(doc.tag(node).as_deref(), Some("div"));
        assert_eq!(doc.text_content(node), "x");
        // div + b + text
        assert_eq!(doc.node_count(), before + 3);
        assert!(!doc.is_connected(node));
    }

    #[test]
    fn test_materialize_empty() {
        let doc = Document::new();
        assert_eq!(doc.materialize("   ").unwrap(), None);
        assert!(doc.materialize("<div>").is_err());
    }

    #[test]
    fn test_append_moves_node() {
        let doc = Document::new();
        let a = mounted(&doc, "<div id='a'></div>");
        let b = mounted(&doc, "<div id='b'></div>");
        let child = doc.create_element("span");

        doc.append_child(a, child).unwrap();
        doc.append_child(b, child).unwrap();

        assert!(doc.children(a).unwrap().is_empty());
        assert_eq!(doc.children(b).unwrap(), vec![child]);
        assert_eq!(doc.parent(child), Some(b));
    }

    #[test]
    fn test_append_rejects_cycles_and_text_parents() {
        let doc = Document::new();
        let outer = mounted(&doc, "<div><span></span></div>");
        let inner = doc.children(outer).unwrap()[0];
        let text = doc.create_text("t");

        assert!(matches!(
            doc.append_child(inner, outer),
            Err(HostError::HierarchyCycle { .. })
        ));
        assert!(matches!(
            doc.append_child(text, inner),
            Err(HostError::NotAnElement(_))
        ));
    }

    #[test]
    fn test_replace_child_keeps_position() {
        let doc = Document::new();
        let list = mounted(&doc, "<ul><li>1</li><li>2</li><li>3</li></ul>");
        let old = doc.children(list).unwrap()[1];
        let new = doc.materialize("<li>two</li>").unwrap().unwrap();

        doc.replace_child(list, new, old).unwrap();

        assert_eq!(doc.text_content(list), "1two3");
        assert_eq!(doc.parent(old), None);
        assert!(doc.contains(old));
    }

    #[test]
    fn test_replace_child_requires_child() {
        let doc = Document::new();
        let a = mounted(&doc, "<div></div>");
        let stray = doc.create_element("p");
        let new = doc.create_element("p");
        assert!(matches!(
            doc.replace_child(a, new, stray),
            Err(HostError::NotAChild { .. })
        ));
    }

    #[test]
    fn test_remove_node_frees_subtree_and_listeners() {
        let doc = Document::new();
        let root = mounted(&doc, "<div><button>go</button></div>");
        let button = doc.children(root).unwrap()[0];
        doc.add_event_listener(button, "click", |_| {}).unwrap();
        assert_eq!(doc.listener_count(), 1);

        assert_eq!(doc.remove_node(root), 3);
        assert!(!doc.contains(button));
        assert_eq!(doc.listener_count(), 0);
        assert!(doc.children(doc.body()).unwrap().is_empty());
        assert_eq!(doc.remove_node(root), 0);
    }

    #[test]
    fn test_detach_keeps_subtree_alive() {
        let doc = Document::new();
        let root = mounted(&doc, "<div><p>kept</p></div>");
        let p = doc.children(root).unwrap()[0];

        doc.detach(p);
        assert!(doc.children(root).unwrap().is_empty());
        assert!(doc.contains(p));
        assert!(!doc.is_connected(p));

        doc.append_child(root, p).unwrap();
        assert_eq!(doc.text_content(root), "kept");
    }

    #[test]
    fn test_ids_are_not_reused() {
        let doc = Document::new();
        let a = doc.create_element("div");
        doc.remove_node(a);
        let b = doc.create_element("div");
        assert_ne!(a, b);
        assert!(!doc.contains(a));
    }

    #[test]
    fn test_queries() {
        let doc = Document::new();
        let root = mounted(
            &doc,
            r#"<main id="app"><section data-slot="a"></section><div><i data-slot="b" data-link></i></div></main>"#,
        );

        assert_eq!(doc.get_element_by_id("app"), Some(root));
        assert_eq!(doc.get_element_by_id("missing"), None);

        let b = doc.find_by_attribute(root, "data-slot", "b").unwrap();
        assert_eq!(doc.tag(b).as_deref(), Some("i"));
        assert_eq!(doc.closest_with_attribute(b, "data-link"), Some(b));
        assert_eq!(doc.closest_with_attribute(b, "id"), Some(root));
        assert_eq!(doc.find_all_by_attribute(root, "data-slot", "a").len(), 1);
    }

    #[test]
    fn test_attributes_and_text() {
        let doc = Document::new();
        let node = mounted(&doc, "<p class=x>old</p>");

        doc.set_attribute(node, "Title", "t").unwrap();
        assert_eq!(doc.attribute(node, "title").as_deref(), Some("t"));
        assert_eq!(doc.remove_attribute(node, "class").unwrap().as_deref(), Some("x"));

        doc.set_text_content(node, "new").unwrap();
        assert_eq!(doc.text_content(node), "new");
        assert_eq!(doc.to_markup(node), r#"<p title="t">new</p>"#);
    }

    #[test]
    fn test_to_markup_escapes() {
        let doc = Document::new();
        let node = doc
            .materialize(r#"<a href="/x?a=1&amp;b=&quot;2&quot;" hidden>1 &lt; 2</a>"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            doc.to_markup(node),
            r#"<a href="/x?a=1&amp;b=&quot;2&quot;" hidden>1 &lt; 2</a>"#
        );
    }

    #[test]
    fn test_dispatch_bubbles_to_ancestors() {
        let doc = Document::new();
        let root = mounted(&doc, "<div><button>go</button></div>");
        let button = doc.children(root).unwrap()[0];
        let order = Rc::new(RefCell::new(Vec::new()));

        for (node, tag) in [(button, "button"), (root, "div"), (doc.body(), "body")] {
            let order = order.clone();
            doc.add_event_listener(node, "click", move |event| {
                order.borrow_mut().push((tag, event.current_target()));
            })
            .unwrap();
        }

        doc.click(button);
        assert_eq!(
            *order.borrow(),
            vec![("button", button), ("div", root), ("body", doc.body())]
        );
    }

    #[test]
    fn test_stop_propagation_and_prevent_default() {
        let doc = Document::new();
        let root = mounted(&doc, "<div><a href='/x'>x</a></div>");
        let link = doc.children(root).unwrap()[0];
        let reached = Rc::new(Cell::new(false));
        let reached_clone = reached.clone();

        doc.add_event_listener(link, "click", |event| {
            event.prevent_default();
            event.stop_propagation();
        })
        .unwrap();
        doc.add_event_listener(root, "click", move |_| reached_clone.set(true))
            .unwrap();

        let event = doc.click(link);
        assert!(event.default_prevented());
        assert!(!reached.get());

        // Non-cancelable events ignore prevent_default
        let plain = doc.dispatch_event(HostEvent::new("focus", link));
        assert!(!plain.default_prevented());
    }

    #[test]
    fn test_non_bubbling_event_stays_on_target() {
        let doc = Document::new();
        let root = mounted(&doc, "<div><span></span></div>");
        let span = doc.children(root).unwrap()[0];
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        doc.add_event_listener(root, "focus", move |_| count_clone.set(count_clone.get() + 1))
            .unwrap();

        doc.dispatch_event(HostEvent::new("focus", span));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_listener_may_mutate_tree() {
        let doc = Document::new();
        let root = mounted(&doc, "<div><button>go</button></div>");
        let button = doc.children(root).unwrap()[0];

        let handle = doc.clone();
        doc.add_event_listener(button, "click", move |_| {
            handle.remove_node(root);
        })
        .unwrap();

        doc.click(button);
        assert!(!doc.contains(root));
    }

    #[test]
    fn test_remove_event_listener() {
        let doc = Document::new();
        let id = doc.add_event_listener(doc.body(), "click", |_| {}).unwrap();
        assert!(doc.remove_event_listener(id));
        assert!(!doc.remove_event_listener(id));
        assert!(doc.add_event_listener(NodeId(999), "click", |_| {}).is_err());
    }
}
