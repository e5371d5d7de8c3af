//! Tile mood pipeline: discovery, dispatch marking, verdicts and reversal.
//!
//! A tile's whole lifecycle is written on the element itself through
//! `data-calm-mood`: `pending` once a request is out, then `clear`,
//! `blocked`, `revealed` or `skipped`. Nothing else is remembered.

use crate::adapters::{HostAdapter, TextFallbacks};
use crate::dom::{Document, NodeId};
use crate::markers::{
    BLURRED_CLASS, EMOTION_ATTR, LABEL_CLASS, MOOD_ATTR, MOOD_BLOCKED, MOOD_CLEAR, MOOD_PENDING,
    MOOD_REVEALED, MOOD_SKIPPED, REVEAL_LISTENER,
};
use crate::settings::Settings;
use crate::types::{ClassificationResponse, Request};
use tracing::{debug, trace};

/// Transient view over one tile element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub element: NodeId,
    pub title: String,
    pub description: String,
}

impl Tile {
    /// Text sent for classification
    pub fn text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.description)
        }
    }
}

/// Text worth classifying has at least one letter or digit
pub fn is_usable_text(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Every tile in the page with a resolvable title, in document order
pub fn discover(doc: &Document, adapter: &HostAdapter) -> Vec<Tile> {
    let mirror = doc.mirror();
    let titles = TextFallbacks::resolve(&mirror, &adapter.tile_title);
    let descriptions = TextFallbacks::resolve(&mirror, &adapter.tile_description);

    HostAdapter::select_all_in(&mirror, &adapter.tile_container)
        .into_iter()
        .filter_map(|element| {
            let title = titles.first_within(doc, element)?;
            let description = descriptions
                .first_within(doc, element)
                .unwrap_or_default();
            Some(Tile {
                element,
                title,
                description,
            })
        })
        .collect()
}

/// Outcome of a tile scan
#[derive(Debug, Default)]
pub struct TileScan {
    /// Tiles marked pending, with the request to send for each
    pub dispatch: Vec<(NodeId, Request)>,
    pub already_processed: usize,
    pub unusable: usize,
}

/// Mark every unprocessed tile and build its classification request.
///
/// The marker is written before the request exists, so a pass re-triggered
/// while the request is in flight sees the tile as processed.
pub fn scan(doc: &mut Document, adapter: &HostAdapter, settings: &Settings) -> TileScan {
    let mut result = TileScan::default();

    for tile in discover(doc, adapter) {
        if doc.has_attr(tile.element, MOOD_ATTR) {
            result.already_processed += 1;
            continue;
        }

        doc.set_attr(tile.element, MOOD_ATTR, MOOD_PENDING);
        let text = tile.text();
        if !is_usable_text(&text) {
            trace!("Tile {} has no usable text", tile.element);
            doc.set_attr(tile.element, MOOD_ATTR, MOOD_SKIPPED);
            result.unusable += 1;
            continue;
        }

        trace!("Tile {} queued: {:?}", tile.element, tile.title);
        result
            .dispatch
            .push((tile.element, Request::classify(&text, settings.mood_method)));
    }

    if !result.dispatch.is_empty() {
        debug!(
            "Tile scan on {}: {} dispatched, {} already processed, {} unusable",
            adapter.key,
            result.dispatch.len(),
            result.already_processed,
            result.unusable
        );
    }
    result
}

/// What a classification reply did to its tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Tile gone or no longer pending; nothing written
    Dropped,
    Clear,
    Blocked(String),
}

/// Apply a classification reply to a pending tile
pub fn apply_verdict(
    doc: &mut Document,
    element: NodeId,
    response: &ClassificationResponse,
    settings: &Settings,
) -> Verdict {
    if !doc.is_connected(element) || doc.attr(element, MOOD_ATTR) != Some(MOOD_PENDING) {
        trace!("Dropping verdict for {}", element);
        return Verdict::Dropped;
    }

    let emotion = response.usable_emotion().map(str::to_lowercase);
    match &emotion {
        Some(e) => {
            doc.set_attr(element, EMOTION_ATTR, e);
        }
        None => {
            doc.remove_attr(element, EMOTION_ATTR);
        }
    }

    match emotion {
        Some(e) if settings.is_blocked(&e) => {
            blur(doc, element, &e);
            Verdict::Blocked(e)
        }
        _ => {
            doc.set_attr(element, MOOD_ATTR, MOOD_CLEAR);
            Verdict::Clear
        }
    }
}

/// Blur a tile, attach its label chip and a one-shot reveal on click
fn blur(doc: &mut Document, element: NodeId, emotion: &str) {
    doc.set_attr(element, MOOD_ATTR, MOOD_BLOCKED);
    doc.add_class(element, BLURRED_CLASS);

    let has_label = doc
        .children(element)
        .iter()
        .any(|child| doc.has_class(*child, LABEL_CLASS));
    if !has_label {
        let label = doc.create_element("span");
        doc.set_attr(label, "class", LABEL_CLASS);
        doc.set_text(label, &format!("Filtered for: {}", emotion));
        doc.append_child(element, label);
    }

    if !doc.has_click_listener(element, REVEAL_LISTENER) {
        doc.add_once_click_listener(element, REVEAL_LISTENER, Box::new(reveal));
    }
    debug!("Blurred tile {} for {}", element, emotion);
}

/// Reveal a blurred tile for good; later settings changes leave it revealed
fn reveal(doc: &mut Document, element: NodeId) {
    if doc.attr(element, MOOD_ATTR) != Some(MOOD_BLOCKED) {
        return;
    }
    strip_treatment(doc, element);
    doc.set_attr(element, MOOD_ATTR, MOOD_REVEALED);
    debug!("Revealed tile {}", element);
}

/// Remove blur, label chip and reveal listener from one tile
fn strip_treatment(doc: &mut Document, element: NodeId) -> bool {
    let mut changed = doc.remove_class(element, BLURRED_CLASS);
    let labels: Vec<NodeId> = doc
        .children(element)
        .iter()
        .copied()
        .filter(|child| doc.has_class(*child, LABEL_CLASS))
        .collect();
    for label in labels {
        changed |= doc.remove(label);
    }
    doc.remove_click_listeners(element, REVEAL_LISTENER);
    changed
}

/// Re-evaluate finished verdicts against the current blocked set.
///
/// Uses the emotion recorded on each tile, so no request is sent. Revealed
/// tiles stay revealed.
pub fn refresh_verdicts(doc: &mut Document, settings: &Settings) -> usize {
    let mut changed = 0;
    for element in doc.elements_with_attr(MOOD_ATTR) {
        let state = doc.attr(element, MOOD_ATTR).map(str::to_string);
        let emotion = doc.attr(element, EMOTION_ATTR).map(str::to_string);
        match (state.as_deref(), emotion) {
            (Some(MOOD_CLEAR), Some(e)) if settings.is_blocked(&e) => {
                blur(doc, element, &e);
                changed += 1;
            }
            (Some(MOOD_BLOCKED), Some(e)) if !settings.is_blocked(&e) => {
                strip_treatment(doc, element);
                doc.set_attr(element, MOOD_ATTR, MOOD_CLEAR);
                changed += 1;
            }
            _ => {}
        }
    }
    changed
}

/// Remove every mood marker and treatment. Cleared tiles are classified
/// afresh the next time the filter runs.
pub fn clear(doc: &mut Document) -> usize {
    strip_all(doc, false)
}

/// Reverse the filter while it is switched off. Revealed tiles keep their
/// marker, so the reveal still holds when the filter comes back on.
pub fn suspend(doc: &mut Document) -> usize {
    strip_all(doc, true)
}

fn strip_all(doc: &mut Document, keep_reveals: bool) -> usize {
    let mut cleared = 0;
    for element in doc.elements_with_attr(MOOD_ATTR) {
        if keep_reveals && doc.attr(element, MOOD_ATTR) == Some(MOOD_REVEALED) {
            continue;
        }
        strip_treatment(doc, element);
        doc.remove_attr(element, EMOTION_ATTR);
        doc.remove_attr(element, MOOD_ATTR);
        cleared += 1;
    }

    // Chips orphaned by a host that dropped our attribute
    for label in doc.elements_with_class(LABEL_CLASS) {
        doc.remove(label);
    }
    for element in doc.elements_with_class(BLURRED_CLASS) {
        strip_treatment(doc, element);
        doc.remove_attr(element, EMOTION_ATTR);
    }

    if cleared > 0 {
        debug!("Cleared mood markers from {} tiles", cleared);
    }
    cleared
}
