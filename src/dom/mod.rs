//! Page tree model.
//!
//! A generational arena standing in for the host page's DOM. The orchestrator
//! never owns page nodes: every [`NodeId`] is a weak handle, and once the host
//! removes a node all handles pointing at it resolve to nothing instead of to
//! whatever later reuses the slot.
//!
//! Writes that would not change state are no-ops and record nothing, so a pass
//! that finds everything already in place leaves the mutation queue empty.

pub mod selector;
pub mod snapshot;

pub use selector::{PageMirror, Selector, SelectorError};
pub use snapshot::{PageSnapshot, SnapshotError, SnapshotNode};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Weak handle to a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    const DANGLING: NodeId = NodeId {
        index: u32::MAX,
        generation: 0,
    };
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Playback state of a `video`/`audio` element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaState {
    pub paused: bool,
    pub muted: bool,
}

/// A change observed on the tree while an observer is connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: usize,
        removed: usize,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
    Style {
        target: NodeId,
        property: String,
    },
    CharacterData {
        target: NodeId,
    },
    Media {
        target: NodeId,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attributes { target, .. }
            | MutationRecord::Style { target, .. }
            | MutationRecord::CharacterData { target }
            | MutationRecord::Media { target } => *target,
        }
    }
}

/// Callback run at most once when a click reaches the node it is attached to.
/// Receives the node the listener was attached to.
pub type ClickListener = Box<dyn FnOnce(&mut Document, NodeId) + Send>;

struct OnceListener {
    owner: &'static str,
    callback: ClickListener,
}

struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    media: Option<MediaState>,
    listeners: Vec<OnceListener>,
}

enum NodeData {
    Element(Element),
    Text(String),
}

struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// The live page tree: `html` with `head` and `body`
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    observing: bool,
    records: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.len())
            .field("observing", &self.observing)
            .field("pending_records", &self.records.len())
            .finish()
    }
}

impl Document {
    /// Create an empty page
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId::DANGLING,
            head: NodeId::DANGLING,
            body: NodeId::DANGLING,
            observing: false,
            records: Vec::new(),
        };

        let root = doc.alloc(NodeData::Element(new_element("html")));
        let head = doc.alloc(NodeData::Element(new_element("head")));
        let body = doc.alloc(NodeData::Element(new_element("body")));
        for child in [head, body] {
            if let Some(node) = doc.node_mut(child) {
                node.parent = Some(root);
            }
        }
        if let Some(node) = doc.node_mut(root) {
            node.children = vec![head, body];
        }

        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Number of live nodes, attached or not
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Arena plumbing
    // ------------------------------------------------------------------

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.node_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = match self.slots.get_mut(current.index as usize) {
                Some(slot) if slot.generation == current.generation => slot,
                _ => continue,
            };
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
        }
    }

    fn record(&mut self, record: MutationRecord) {
        if self.observing {
            self.records.push(record);
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Whether the handle still refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Whether the node is live and reachable from the root
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                return self.contains(node_id);
            }
            current = self.node(node_id).and_then(|n| n.parent);
        }
        false
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// Lowercase tag name of an element
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(new_element(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.parent(node_id);
        }
        false
    }

    fn detach(&mut self, id: NodeId) {
        let parent = match self.parent(id) {
            Some(p) => p,
            None => return,
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
        self.record(MutationRecord::ChildList {
            target: parent,
            added: 0,
            removed: 1,
        });
    }

    fn insert_child(&mut self, parent: NodeId, child: NodeId, at_start: bool) -> bool {
        if !self.is_element(parent) || !self.contains(child) || child == self.root {
            return false;
        }
        if self.is_ancestor_or_self(child, parent) {
            return false;
        }

        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            if at_start {
                node.children.insert(0, child);
            } else {
                node.children.push(child);
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        self.record(MutationRecord::ChildList {
            target: parent,
            added: 1,
            removed: 0,
        });
        true
    }

    /// Append `child` as the last child of `parent`, moving it if attached elsewhere
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_child(parent, child, false)
    }

    /// Insert `child` as the first child of `parent`
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_child(parent, child, true)
    }

    /// Remove a node and its subtree from the page. Every handle into the
    /// subtree goes stale. The root, head and body cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.contains(id) || id == self.root || id == self.head || id == self.body {
            return false;
        }
        self.detach(id);
        self.free_subtree(id);
        true
    }

    // ------------------------------------------------------------------
    // Attributes and classes
    // ------------------------------------------------------------------

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.attrs.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.element(id)
            .into_iter()
            .flat_map(|el| el.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Set an attribute; returns whether the tree changed
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let el = match self.element_mut(id) {
            Some(el) => el,
            None => return false,
        };
        if el.attrs.get(name).map(String::as_str) == Some(value) {
            return false;
        }
        el.attrs.insert(name.to_string(), value.to_string());
        self.record(MutationRecord::Attributes {
            target: id,
            name: name.to_string(),
        });
        true
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        let removed = self
            .element_mut(id)
            .map(|el| el.attrs.remove(name).is_some())
            .unwrap_or(false);
        if removed {
            self.record(MutationRecord::Attributes {
                target: id,
                name: name.to_string(),
            });
        }
        removed
    }

    pub fn class_list(&self, id: NodeId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_whitespace().any(|existing| existing == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        if !self.is_element(id) || self.has_class(id, class) {
            return false;
        }
        let mut classes: Vec<String> = self
            .class_list(id)
            .into_iter()
            .map(str::to_string)
            .collect();
        classes.push(class.to_string());
        self.set_attr(id, "class", &classes.join(" "))
    }

    /// Remove a class; an emptied `class` attribute is dropped entirely
    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        if !self.has_class(id, class) {
            return false;
        }
        let remaining: Vec<String> = self
            .class_list(id)
            .into_iter()
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        if remaining.is_empty() {
            self.remove_attr(id, "class")
        } else {
            self.set_attr(id, "class", &remaining.join(" "))
        }
    }

    // ------------------------------------------------------------------
    // Inline style and media
    // ------------------------------------------------------------------

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.style.get(property))
            .map(String::as_str)
    }

    pub fn styles(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.element(id)
            .into_iter()
            .flat_map(|el| el.style.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> bool {
        let el = match self.element_mut(id) {
            Some(el) => el,
            None => return false,
        };
        if el.style.get(property).map(String::as_str) == Some(value) {
            return false;
        }
        el.style.insert(property.to_string(), value.to_string());
        self.record(MutationRecord::Style {
            target: id,
            property: property.to_string(),
        });
        true
    }

    pub fn media(&self, id: NodeId) -> Option<MediaState> {
        self.element(id).and_then(|el| el.media)
    }

    pub(crate) fn set_media(&mut self, id: NodeId, state: MediaState) {
        if let Some(el) = self.element_mut(id) {
            if el.media.is_some() {
                el.media = Some(state);
            }
        }
    }

    fn update_media(&mut self, id: NodeId, f: impl FnOnce(&mut MediaState) -> bool) -> bool {
        let changed = self
            .element_mut(id)
            .and_then(|el| el.media.as_mut())
            .map(f)
            .unwrap_or(false);
        if changed {
            self.record(MutationRecord::Media { target: id });
        }
        changed
    }

    /// Pause a media element; no-op on anything already paused or non-media
    pub fn pause(&mut self, id: NodeId) -> bool {
        self.update_media(id, |m| !std::mem::replace(&mut m.paused, true))
    }

    pub fn set_muted(&mut self, id: NodeId, muted: bool) -> bool {
        self.update_media(id, |m| std::mem::replace(&mut m.muted, muted) != muted)
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// Concatenated text of the node and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.node(id) {
            Some(Node {
                data: NodeData::Text(text),
                ..
            }) => out.push_str(text),
            Some(node) => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Replace an element's children with a single text node
    pub fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        let current = match self.node(id) {
            Some(node) => node,
            None => return false,
        };

        if let NodeData::Text(existing) = &current.data {
            if existing == text {
                return false;
            }
            if let Some(Node {
                data: NodeData::Text(existing),
                ..
            }) = self.node_mut(id)
            {
                *existing = text.to_string();
            }
            self.record(MutationRecord::CharacterData { target: id });
            return true;
        }

        let children = current.children.clone();
        if let [only] = children.as_slice() {
            if let Some(Node {
                data: NodeData::Text(existing),
                ..
            }) = self.node(*only)
            {
                if existing == text {
                    return false;
                }
                let only = *only;
                if let Some(Node {
                    data: NodeData::Text(existing),
                    ..
                }) = self.node_mut(only)
                {
                    *existing = text.to_string();
                }
                self.record(MutationRecord::CharacterData { target: only });
                return true;
            }
        }

        for child in children {
            self.remove(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Descendants of `scope` in document order, excluding `scope`
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Selector view of the page as it is now
    pub fn mirror(&self) -> PageMirror<'_> {
        PageMirror::build(self)
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.mirror().matches(id, selector)
    }

    /// All elements in the page matching `selector`, in document order
    pub fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.mirror().select(selector)
    }

    pub fn query_first(&self, selector: &Selector) -> Option<NodeId> {
        self.query_all(selector).into_iter().next()
    }

    /// Matching descendants of `scope`, excluding `scope` itself
    pub fn query_all_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.mirror().select_within(scope, selector)
    }

    pub fn query_first_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.query_all_within(scope, selector).into_iter().next()
    }

    /// First element in document order whose `id` attribute equals `id`
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .find(|node| self.attr(*node, "id") == Some(id))
    }

    /// Every element carrying `class`, in document order
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter(|node| self.has_class(*node, class))
            .collect()
    }

    /// Every element carrying attribute `name`, in document order
    pub fn elements_with_attr(&self, name: &str) -> Vec<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter(|node| self.has_attr(*node, name))
            .collect()
    }

    /// Nearest inclusive ancestor matching `selector`
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let mirror = self.mirror();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if mirror.matches(node_id, selector) {
                return Some(node_id);
            }
            current = self.parent(node_id);
        }
        None
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Attach a listener that fires on the first click reaching `id`
    pub fn add_once_click_listener(
        &mut self,
        id: NodeId,
        owner: &'static str,
        callback: ClickListener,
    ) -> bool {
        match self.element_mut(id) {
            Some(el) => {
                el.listeners.push(OnceListener { owner, callback });
                true
            }
            None => false,
        }
    }

    pub fn has_click_listener(&self, id: NodeId, owner: &str) -> bool {
        self.element(id)
            .map(|el| el.listeners.iter().any(|l| l.owner == owner))
            .unwrap_or(false)
    }

    /// Drop the listeners `owner` attached to `id`; returns how many were dropped
    pub fn remove_click_listeners(&mut self, id: NodeId, owner: &str) -> usize {
        match self.element_mut(id) {
            Some(el) => {
                let before = el.listeners.len();
                el.listeners.retain(|l| l.owner != owner);
                before - el.listeners.len()
            }
            None => 0,
        }
    }

    /// Dispatch a click at `id`, bubbling to the root. Listeners are consumed
    /// before they run. Returns the number of listeners fired.
    pub fn dispatch_click(&mut self, id: NodeId) -> usize {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            path.push(node_id);
            current = self.parent(node_id);
        }

        let mut fired = 0;
        for node_id in path {
            let listeners = match self.element_mut(node_id) {
                Some(el) => std::mem::take(&mut el.listeners),
                None => continue,
            };
            for listener in listeners {
                (listener.callback)(self, node_id);
                fired += 1;
            }
        }
        fired
    }

    // ------------------------------------------------------------------
    // Mutation observation
    // ------------------------------------------------------------------

    /// Start queueing mutation records for the whole tree
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stop queueing and drop anything pending
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.records.clear();
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }
}

fn new_element(tag: &str) -> Element {
    let tag = tag.to_ascii_lowercase();
    let media = match tag.as_str() {
        "video" | "audio" => Some(MediaState {
            paused: true,
            muted: false,
        }),
        _ => None,
    };
    Element {
        tag,
        attrs: BTreeMap::new(),
        style: BTreeMap::new(),
        media,
        listeners: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn test_new_document_shape() {
        let doc = Document::new();
        assert_eq!(doc.tag(doc.root()), Some("html"));
        assert_eq!(doc.children(doc.root()), &[doc.head(), doc.body()]);
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_removed_handles_go_stale() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let span = doc.create_element("span");
        doc.append_child(doc.body(), div);
        doc.append_child(div, span);

        assert!(doc.remove(div));
        assert!(!doc.contains(div));
        assert!(!doc.contains(span));

        // Slot reuse must not revive the old handle
        let fresh = doc.create_element("p");
        assert!(doc.contains(fresh));
        assert!(!doc.contains(div));
        assert_eq!(doc.tag(div), None);
    }

    #[test]
    fn test_class_helpers_are_idempotent() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attr(div, "class", "card");

        assert!(doc.add_class(div, "calm-hidden"));
        assert!(!doc.add_class(div, "calm-hidden"));
        assert_eq!(doc.attr(div, "class"), Some("card calm-hidden"));

        assert!(doc.remove_class(div, "calm-hidden"));
        assert!(!doc.remove_class(div, "calm-hidden"));
        assert_eq!(doc.attr(div, "class"), Some("card"));

        doc.remove_class(div, "card");
        assert!(!doc.has_attr(div, "class"));
    }

    #[test]
    fn test_records_only_while_observing() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.append_child(doc.body(), div);
        assert!(doc.take_records().is_empty());

        doc.observe();
        doc.set_attr(div, "id", "x");
        doc.set_attr(div, "id", "x");
        let records = doc.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target(), div);

        doc.disconnect();
        doc.set_attr(div, "id", "y");
        assert!(doc.take_records().is_empty());
    }

    #[test]
    fn test_text_content_and_set_text() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let a = doc.create_text("Hello ");
        let b = doc.create_element("b");
        let c = doc.create_text("world");
        doc.append_child(doc.body(), div);
        doc.append_child(div, a);
        doc.append_child(div, b);
        doc.append_child(b, c);

        assert_eq!(doc.text_content(div), "Hello world");
        assert!(doc.set_text(div, "replaced"));
        assert_eq!(doc.text_content(div), "replaced");
        assert!(!doc.set_text(div, "replaced"));
        assert!(!doc.contains(b));
    }

    #[test]
    fn test_media_controls() {
        let mut doc = Document::new();
        let video = doc.create_element("VIDEO");
        doc.set_media(
            video,
            MediaState {
                paused: false,
                muted: false,
            },
        );

        assert!(doc.pause(video));
        assert!(!doc.pause(video));
        assert!(doc.set_muted(video, true));
        assert!(!doc.set_muted(video, true));

        let div = doc.create_element("div");
        assert!(!doc.pause(div));
        assert_eq!(doc.media(div), None);
    }

    #[test]
    fn test_queries_in_document_order() {
        let mut doc = Document::new();
        let list = doc.create_element("ul");
        doc.append_child(doc.body(), list);
        let mut items = Vec::new();
        for _ in 0..3 {
            let li = doc.create_element("li");
            doc.append_child(list, li);
            items.push(li);
        }

        assert_eq!(doc.query_all(&sel("li")), items);
        assert_eq!(doc.query_first(&sel("ul > li")), Some(items[0]));
        assert_eq!(doc.query_all_within(list, &sel("ul")), Vec::<NodeId>::new());
        assert_eq!(doc.closest(items[1], &sel("ul")), Some(list));
    }

    #[test]
    fn test_marker_lookups() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(doc.body(), a);
        doc.append_child(a, b);
        doc.set_attr(b, "id", "badge");
        doc.add_class(a, "calm-hidden");
        doc.add_class(b, "calm-hidden");
        doc.set_attr(b, "data-calm-mood", "pending");

        assert_eq!(doc.element_by_id("badge"), Some(b));
        assert_eq!(doc.element_by_id("missing"), None);
        assert_eq!(doc.elements_with_class("calm-hidden"), vec![a, b]);
        assert_eq!(doc.elements_with_attr("data-calm-mood"), vec![b]);
    }

    #[test]
    fn test_once_click_listener_fires_once_and_bubbles() {
        let mut doc = Document::new();
        let tile = doc.create_element("div");
        let label = doc.create_element("span");
        doc.append_child(doc.body(), tile);
        doc.append_child(tile, label);

        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        doc.add_once_click_listener(
            tile,
            "test",
            Box::new(move |doc, node| {
                seen.fetch_add(1, Ordering::SeqCst);
                doc.add_class(node, "clicked");
            }),
        );

        assert_eq!(doc.dispatch_click(label), 1);
        assert_eq!(doc.dispatch_click(label), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(doc.has_class(tile, "clicked"));
    }

    #[test]
    fn test_remove_click_listeners_by_owner() {
        let mut doc = Document::new();
        let tile = doc.create_element("div");
        doc.add_once_click_listener(tile, "a", Box::new(|_, _| {}));
        doc.add_once_click_listener(tile, "b", Box::new(|_, _| {}));

        assert_eq!(doc.remove_click_listeners(tile, "a"), 1);
        assert!(!doc.has_click_listener(tile, "a"));
        assert!(doc.has_click_listener(tile, "b"));
    }

    #[test]
    fn test_cannot_move_node_into_itself() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(doc.body(), outer);
        doc.append_child(outer, inner);

        assert!(!doc.append_child(inner, outer));
        assert_eq!(doc.parent(outer), Some(doc.body()));
    }
}
