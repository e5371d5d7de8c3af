//! Declutter transforms: promo removal, motion suppression and minimal layout.
//!
//! Promo removal and motion suppression are one-way. Minimal layout only adds
//! the hidden marker class, so stripping that class undoes it exactly.

use crate::adapters::HostAdapter;
use crate::dom::Document;
use crate::markers::{
    ACTIVE_CLASS, HIDDEN_CLASS, MINIMAL_CLASS, ROOT_CLASSES, STILL_ATTR, STILL_CLASS, STYLESHEET,
    STYLE_ID,
};
use crate::settings::Settings;
use tracing::{debug, trace};

/// Changes made by one declutter run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclutterReport {
    pub promos_removed: usize,
    pub motion_suppressed: usize,
    pub layout_hidden: usize,
    pub layout_revealed: usize,
    pub root_changes: usize,
}

impl DeclutterReport {
    pub fn total(&self) -> usize {
        self.promos_removed
            + self.motion_suppressed
            + self.layout_hidden
            + self.layout_revealed
            + self.root_changes
    }
}

/// Run every declutter step the settings enable, and reverse minimal layout
/// when it is off.
pub fn apply(doc: &mut Document, adapter: &HostAdapter, settings: &Settings) -> DeclutterReport {
    let mut report = DeclutterReport {
        root_changes: sync_root(doc, settings),
        ..Default::default()
    };

    if settings.hide_promos {
        report.promos_removed = remove_promos(doc, adapter);
    }
    if settings.reduce_motion {
        report.motion_suppressed = suppress_motion(doc, adapter);
    }
    if settings.minimal_layout {
        report.layout_hidden = hide_layout(doc, adapter);
    } else {
        report.layout_revealed = reveal_layout(doc);
    }

    if report.total() > 0 {
        debug!("Declutter on {}: {:?}", adapter.key, report);
    }
    report
}

/// Remove every promo match outright
pub fn remove_promos(doc: &mut Document, adapter: &HostAdapter) -> usize {
    let mut removed = 0;
    for id in HostAdapter::select_all(doc, &adapter.promo) {
        // Nested matches are already gone with their ancestor
        if doc.remove(id) {
            trace!("Removed promo {}", id);
            removed += 1;
        }
    }
    removed
}

/// Disable animation and transition on motion matches; pause and mute videos.
/// Every write is a no-op when already in place, so re-running is free.
pub fn suppress_motion(doc: &mut Document, adapter: &HostAdapter) -> usize {
    let mut suppressed = 0;
    for id in HostAdapter::select_all(doc, &adapter.motion) {
        let mut changed = doc.set_style(id, "animation", "none");
        changed |= doc.set_style(id, "transition", "none");
        if doc.tag(id) == Some("video") {
            changed |= doc.pause(id);
            changed |= doc.set_muted(id, true);
        }
        changed |= doc.set_attr(id, STILL_ATTR, "true");
        if changed {
            trace!("Suppressed motion on {}", id);
            suppressed += 1;
        }
    }
    suppressed
}

/// Mark layout matches hidden; already-hidden elements are skipped
pub fn hide_layout(doc: &mut Document, adapter: &HostAdapter) -> usize {
    HostAdapter::select_all(doc, &adapter.layout)
        .into_iter()
        .filter(|id| doc.add_class(*id, HIDDEN_CLASS))
        .count()
}

/// Strip the hidden marker from every element carrying it
pub fn reveal_layout(doc: &mut Document) -> usize {
    doc.elements_with_class(HIDDEN_CLASS)
        .into_iter()
        .filter(|id| doc.remove_class(*id, HIDDEN_CLASS))
        .count()
}

/// Bring root classes and the stylesheet in line with the settings
pub fn sync_root(doc: &mut Document, settings: &Settings) -> usize {
    let root = doc.root();
    let mut changes = 0;
    changes += usize::from(ensure_stylesheet(doc));
    changes += usize::from(doc.add_class(root, ACTIVE_CLASS));
    changes += usize::from(toggle_class(doc, MINIMAL_CLASS, settings.minimal_layout));
    changes += usize::from(toggle_class(doc, STILL_CLASS, settings.reduce_motion));
    changes
}

fn toggle_class(doc: &mut Document, class: &str, on: bool) -> bool {
    let root = doc.root();
    if on {
        doc.add_class(root, class)
    } else {
        doc.remove_class(root, class)
    }
}

/// Drop every root class and the stylesheet
pub fn clear_root(doc: &mut Document) -> usize {
    let root = doc.root();
    let mut changes = ROOT_CLASSES
        .iter()
        .filter(|class| doc.remove_class(root, class))
        .count();
    if let Some(style) = doc.element_by_id(STYLE_ID) {
        changes += usize::from(doc.remove(style));
    }
    changes
}

/// Inject the marker stylesheet into the head once
pub fn ensure_stylesheet(doc: &mut Document) -> bool {
    if doc.element_by_id(STYLE_ID).is_some() {
        return false;
    }
    let style = doc.create_element("style");
    doc.set_attr(style, "id", STYLE_ID);
    doc.set_text(style, STYLESHEET.trim());
    let head = doc.head();
    doc.append_child(head, style)
}
