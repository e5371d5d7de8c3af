//! Summary injection for the page's summary target container.

use crate::adapters::{collapse_whitespace, HostAdapter};
use crate::config::SummaryConfig;
use crate::dom::{Document, NodeId};
use crate::markers::{
    SUMMARY_ATTR, SUMMARY_BOX_CLASS, SUMMARY_DONE, SUMMARY_EMPTY, SUMMARY_PENDING,
};
use crate::types::{Request, SummaryResponse};
use tracing::{debug, trace};

/// The one container a summary goes into, if the page has one
pub fn resolve_target(doc: &Document, adapter: &HostAdapter) -> Option<NodeId> {
    HostAdapter::first_match(doc, &adapter.summary_target)
}

/// Title, description and the first rows, joined and truncated
pub fn aggregate(doc: &Document, adapter: &HostAdapter, config: &SummaryConfig) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.extend(HostAdapter::first_text(doc, &adapter.summary_title));
    parts.extend(HostAdapter::first_text(doc, &adapter.summary_description));
    parts.extend(
        HostAdapter::select_all(doc, &adapter.summary_rows)
            .into_iter()
            .take(config.max_rows)
            .map(|row| collapse_whitespace(&doc.text_content(row)))
            .filter(|text| !text.is_empty()),
    );

    truncate_chars(&parts.join(config.separator.as_str()), config.max_chars)
}

/// Cut to at most `max_chars` characters, never inside a character
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Mark the target requested and build its request.
///
/// Returns `None` when there is no target, it is already marked, or the page
/// has no text yet; an empty page is retried on a later pass.
pub fn request(
    doc: &mut Document,
    adapter: &HostAdapter,
    config: &SummaryConfig,
) -> Option<(NodeId, Request)> {
    let target = resolve_target(doc, adapter)?;
    if doc.has_attr(target, SUMMARY_ATTR) {
        trace!("Summary target {} already requested", target);
        return None;
    }

    let text = aggregate(doc, adapter, config);
    if text.trim().is_empty() {
        return None;
    }

    doc.set_attr(target, SUMMARY_ATTR, SUMMARY_PENDING);
    debug!(
        "Requesting summary for {} ({} chars)",
        target,
        text.chars().count()
    );
    Some((target, Request::summarise(&text)))
}

/// What a summary reply did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Target gone or not pending; nothing written
    Dropped,
    Injected,
    /// No usable summary; the target is not asked again
    Empty,
}

fn existing_box(doc: &Document, target: NodeId) -> Option<NodeId> {
    doc.children(target)
        .iter()
        .copied()
        .find(|child| doc.has_class(*child, SUMMARY_BOX_CLASS))
}

/// Inject a reply as the target's first child, once
pub fn apply(doc: &mut Document, target: NodeId, response: &SummaryResponse) -> SummaryOutcome {
    if !doc.is_connected(target) || doc.attr(target, SUMMARY_ATTR) != Some(SUMMARY_PENDING) {
        trace!("Dropping summary for {}", target);
        return SummaryOutcome::Dropped;
    }

    let summary = match response.usable_summary() {
        Some(s) => s.to_string(),
        None => {
            doc.set_attr(target, SUMMARY_ATTR, SUMMARY_EMPTY);
            return SummaryOutcome::Empty;
        }
    };

    if existing_box(doc, target).is_none() {
        let summary_box = doc.create_element("div");
        doc.set_attr(summary_box, "class", SUMMARY_BOX_CLASS);
        doc.set_text(summary_box, &summary);
        doc.prepend_child(target, summary_box);
    }
    doc.set_attr(target, SUMMARY_ATTR, SUMMARY_DONE);
    debug!("Injected summary into {}", target);
    SummaryOutcome::Injected
}

/// Remove every injected box and target marker
pub fn clear(doc: &mut Document) -> usize {
    let mut changes = 0;
    for summary_box in doc.elements_with_class(SUMMARY_BOX_CLASS) {
        changes += usize::from(doc.remove(summary_box));
    }
    for target in doc.elements_with_attr(SUMMARY_ATTR) {
        changes += usize::from(doc.remove_attr(target, SUMMARY_ATTR));
    }
    changes
}
