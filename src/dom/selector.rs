//! Selectors for the host adapter tables, parsed by `scraper`.
//!
//! Matching runs against a [`PageMirror`]: an HTML rendition of the arena in
//! which every element carries its arena slot, so matches resolve back to
//! [`NodeId`]s. The arena stays the only tree that is ever written.

use super::{Document, Node, NodeData, NodeId};
use scraper::Html;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attribute carrying an element's position in [`PageMirror::ids`]
const MIRROR_ATTR: &str = "data-calm-node";

/// Elements that take no end tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// A selector that failed to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector {selector:?}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

/// A parsed, reusable selector list
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    inner: scraper::Selector,
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        let inner = scraper::Selector::parse(source).map_err(|e| SelectorError {
            selector: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            inner,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `id` matches. Builds a mirror; use [`PageMirror`] for batches.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        PageMirror::build(doc).matches(id, self)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Read-only HTML view of a document for selector matching.
///
/// Valid until the document is next written; build a fresh one after changes.
pub struct PageMirror<'a> {
    doc: &'a Document,
    html: Html,
    ids: Vec<NodeId>,
}

impl<'a> PageMirror<'a> {
    pub fn build(doc: &'a Document) -> Self {
        let mut markup = String::from("<!DOCTYPE html>");
        let mut ids = Vec::new();
        render(doc, doc.root, &mut markup, &mut ids);
        Self {
            doc,
            html: Html::parse_document(&markup),
            ids,
        }
    }

    /// Every matching element, unordered
    pub fn matching(&self, selector: &Selector) -> HashSet<NodeId> {
        self.html
            .select(&selector.inner)
            .filter_map(|element| element.value().attr(MIRROR_ATTR))
            .filter_map(|slot| slot.parse::<usize>().ok())
            .filter_map(|slot| self.ids.get(slot).copied())
            .collect()
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// Every matching element, in document order
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        let matched = self.matching(selector);
        if matched.is_empty() {
            return Vec::new();
        }
        std::iter::once(self.doc.root)
            .chain(self.doc.descendants(self.doc.root))
            .filter(|id| matched.contains(id))
            .collect()
    }

    /// Matching descendants of `scope`, excluding `scope` itself
    pub fn select_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let matched = self.matching(selector);
        if matched.is_empty() {
            return Vec::new();
        }
        self.doc
            .descendants(scope)
            .into_iter()
            .filter(|id| matched.contains(id))
            .collect()
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.matching(selector).contains(&id)
    }
}

fn is_markup_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn render(doc: &Document, id: NodeId, out: &mut String, ids: &mut Vec<NodeId>) {
    let node: &Node = match doc.node(id) {
        Some(node) => node,
        None => return,
    };
    let element = match &node.data {
        NodeData::Text(text) => {
            escape_into(out, text);
            return;
        }
        NodeData::Element(element) => element,
    };

    let tag = if is_markup_name(&element.tag) {
        element.tag.to_ascii_lowercase()
    } else {
        "calm-unknown".to_string()
    };

    out.push('<');
    out.push_str(&tag);
    out.push_str(&format!(" {}=\"{}\"", MIRROR_ATTR, ids.len()));
    ids.push(id);
    for (name, value) in &element.attrs {
        if name == MIRROR_ATTR || !is_markup_name(name) {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(out, value);
        out.push('"');
    }
    out.push('>');

    for child in &node.children {
        render(doc, *child, out, ids);
    }

    if !VOID_TAGS.contains(&tag.as_str()) {
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let section = doc.create_element("section");
        doc.set_attr(section, "data-testid", "home-shelf");
        doc.set_attr(section, "class", "shelf promo-banner");
        let card = doc.create_element("div");
        doc.set_attr(card, "class", "card");
        doc.set_attr(card, "role", "group");
        let title = doc.create_element("a");
        doc.set_attr(title, "id", "title-1");
        doc.set_attr(title, "href", "/album/42");

        doc.append_child(doc.body(), section);
        doc.append_child(section, card);
        doc.append_child(card, title);
        (doc, section, card, title)
    }

    fn matches(doc: &Document, id: NodeId, s: &str) -> bool {
        Selector::parse(s).unwrap().matches(doc, id)
    }

    #[test]
    fn test_simple_selectors() {
        let (doc, section, card, title) = page();
        assert!(matches(&doc, section, "section"));
        assert!(matches(&doc, card, ".card"));
        assert!(matches(&doc, title, "#title-1"));
        assert!(matches(&doc, title, "*"));
        assert!(!matches(&doc, card, "section"));
    }

    #[test]
    fn test_attribute_operators() {
        let (doc, section, card, title) = page();
        assert!(matches(&doc, section, "[data-testid]"));
        assert!(matches(&doc, section, "[data-testid='home-shelf']"));
        assert!(matches(&doc, section, "[class~=shelf]"));
        assert!(matches(&doc, section, "[class*=\"promo\"]"));
        assert!(matches(&doc, title, "a[href^='/album']"));
        assert!(matches(&doc, title, "a[href$='42']"));
        assert!(!matches(&doc, card, "[data-testid]"));
    }

    #[test]
    fn test_combinators_and_lists() {
        let (doc, section, card, title) = page();
        assert!(matches(&doc, title, "section a"));
        assert!(matches(&doc, title, "body section .card > a"));
        assert!(!matches(&doc, title, "section > a"));
        assert!(matches(&doc, card, "div:not(.calm-hidden)"));
        assert!(!matches(&doc, card, "div:not([role=group])"));
        assert!(matches(&doc, section, "aside, section"));
    }

    #[test]
    fn test_mirror_follows_arena_order_and_removal() {
        let (mut doc, section, card, _title) = page();
        let extra = doc.create_element("div");
        doc.set_attr(extra, "class", "card");
        doc.prepend_child(doc.body(), extra);

        let cards = Selector::parse(".card").unwrap();
        assert_eq!(PageMirror::build(&doc).select(&cards), vec![extra, card]);
        assert_eq!(
            PageMirror::build(&doc).select_within(section, &cards),
            vec![card]
        );

        doc.remove(extra);
        assert_eq!(PageMirror::build(&doc).select(&cards), vec![card]);
    }

    #[test]
    fn test_markup_in_values_does_not_leak() {
        let mut doc = Document::new();
        let row = doc.create_element("div");
        doc.set_attr(row, "title", "\"><span class=\"injected\">");
        doc.set_text(row, "<b class=\"injected\">Sad</b>");
        doc.append_child(doc.body(), row);

        let injected = Selector::parse(".injected").unwrap();
        assert!(PageMirror::build(&doc).select(&injected).is_empty());
        assert!(matches(&doc, row, "div[title^='\"']"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Selector::parse("  ").is_err());
        assert!(Selector::parse("div >").is_err());
        let err = Selector::parse("!!div").unwrap_err();
        assert_eq!(err.selector, "!!div");
        assert!(err.to_string().starts_with("invalid selector"));
    }

    #[test]
    fn test_display_keeps_trimmed_source() {
        let selector: Selector = " video , [role='banner'] ".parse().unwrap();
        assert_eq!(selector.to_string(), "video , [role='banner']");
    }
}
