//! JSON page snapshots for loading fixtures and dumping results

use super::{Document, MediaState, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read page snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid page snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializable view of a whole page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub head: Vec<SnapshotNode>,
    #[serde(default)]
    pub body: Vec<SnapshotNode>,
}

/// One node of a snapshot. Elements are tried first so that a stray `text`
/// key on an element does not turn it into a text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        style: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media: Option<MediaState>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<SnapshotNode>,
    },
    Text {
        text: String,
    },
}

impl SnapshotNode {
    pub fn element(tag: &str) -> Self {
        SnapshotNode::Element {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            style: BTreeMap::new(),
            media: None,
            children: Vec::new(),
        }
    }

    pub fn text(text: &str) -> Self {
        SnapshotNode::Text {
            text: text.to_string(),
        }
    }

    /// Builder: add an attribute (no-op on text nodes)
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        if let SnapshotNode::Element { attrs, .. } = &mut self {
            attrs.insert(name.to_string(), value.to_string());
        }
        self
    }

    /// Builder: append a child (no-op on text nodes)
    pub fn child(mut self, node: SnapshotNode) -> Self {
        if let SnapshotNode::Element { children, .. } = &mut self {
            children.push(node);
        }
        self
    }

    /// Builder: append a text child
    pub fn with_text(self, text: &str) -> Self {
        self.child(SnapshotNode::text(text))
    }
}

impl PageSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Document {
    /// Build a fresh document from a snapshot
    pub fn from_snapshot(snapshot: &PageSnapshot) -> Self {
        let mut doc = Document::new();
        let (head, body) = (doc.head(), doc.body());
        for node in &snapshot.head {
            doc.build(head, node);
        }
        for node in &snapshot.body {
            doc.build(body, node);
        }
        doc
    }

    fn build(&mut self, parent: NodeId, node: &SnapshotNode) {
        match node {
            SnapshotNode::Text { text } => {
                let id = self.create_text(text);
                self.append_child(parent, id);
            }
            SnapshotNode::Element {
                tag,
                attrs,
                style,
                media,
                children,
            } => {
                let id = self.create_element(tag);
                for (name, value) in attrs {
                    self.set_attr(id, name, value);
                }
                for (property, value) in style {
                    self.set_style(id, property, value);
                }
                if let Some(state) = media {
                    self.set_media(id, *state);
                } else if attrs.contains_key("autoplay") {
                    self.set_media(
                        id,
                        MediaState {
                            paused: false,
                            muted: attrs.contains_key("muted"),
                        },
                    );
                }
                self.append_child(parent, id);
                for child in children {
                    self.build(id, child);
                }
            }
        }
    }

    /// Capture the current head and body as a snapshot
    pub fn to_snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            head: self
                .children(self.head())
                .iter()
                .filter_map(|id| self.capture(*id))
                .collect(),
            body: self
                .children(self.body())
                .iter()
                .filter_map(|id| self.capture(*id))
                .collect(),
        }
    }

    fn capture(&self, id: NodeId) -> Option<SnapshotNode> {
        if !self.contains(id) {
            return None;
        }
        let tag = match self.tag(id) {
            Some(tag) => tag.to_string(),
            None => return Some(SnapshotNode::text(&self.text_content(id))),
        };

        Some(SnapshotNode::Element {
            tag,
            attrs: self
                .attributes(id)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            style: self
                .styles(id)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            media: self.media(id),
            children: self
                .children(id)
                .iter()
                .filter_map(|child| self.capture(*child))
                .collect(),
        })
    }
}
