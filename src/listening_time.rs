//! Listening-time badge: sums track durations on the page against a target.

use crate::adapters::HostAdapter;
use crate::dom::Document;
use crate::markers::{BADGE_CLASS, BADGE_ID};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

/// Totals within this many minutes of the target count as a match
pub const MATCH_TOLERANCE_MINUTES: u64 = 5;

lazy_static! {
    static ref DURATION_PATTERN: Regex =
        Regex::new(r"^(\d+):(\d{2})(?::(\d{2}))?").unwrap();
}

/// Parse a leading `M:SS` or `H:MM:SS` literal into seconds.
/// Literals too large for a `u64` count of seconds are ignored.
pub fn parse_duration(text: &str) -> Option<u64> {
    let caps = DURATION_PATTERN.captures(text.trim())?;
    let first: u64 = caps.get(1)?.as_str().parse().ok()?;
    let second: u64 = caps.get(2)?.as_str().parse().ok()?;

    match caps.get(3) {
        Some(third) => {
            let seconds: u64 = third.as_str().parse().ok()?;
            first
                .checked_mul(3600)?
                .checked_add(second * 60)?
                .checked_add(seconds)
        }
        None => first.checked_mul(60)?.checked_add(second),
    }
}

/// Sum of every parseable duration element on the page
pub fn total_seconds(doc: &Document, adapter: &HostAdapter) -> u64 {
    HostAdapter::select_all(doc, &adapter.duration)
        .into_iter()
        .filter_map(|id| {
            let text = doc.text_content(id);
            let parsed = parse_duration(&text);
            if parsed.is_none() {
                trace!("Ignoring duration text {:?}", text);
            }
            parsed
        })
        .fold(0, u64::saturating_add)
}

/// Badge text for a total, compared with the target when one is set
pub fn badge_text(total_seconds: u64, target_minutes: u32) -> String {
    let minutes = (total_seconds as f64 / 60.0).round() as u64;
    let target = u64::from(target_minutes);

    if target == 0 {
        return format!("Listening time: {} min", minutes);
    }

    let comparison = if minutes.abs_diff(target) <= MATCH_TOLERANCE_MINUTES {
        format!("matches your {} min target", target)
    } else if minutes > target {
        format!("{} min longer than target", minutes - target)
    } else {
        format!("{} min shorter than target", target - minutes)
    };
    format!("Listening time: {} min ({})", minutes, comparison)
}

/// What a render did to the badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeChange {
    Created,
    Updated,
    Removed,
    Unchanged,
}

/// Render, update or remove the single badge
pub fn render(doc: &mut Document, adapter: &HostAdapter, target_minutes: u32) -> BadgeChange {
    let total = total_seconds(doc, adapter);
    if total == 0 {
        return if remove_badge(doc) {
            BadgeChange::Removed
        } else {
            BadgeChange::Unchanged
        };
    }

    let text = badge_text(total, target_minutes);
    match doc.element_by_id(BADGE_ID) {
        Some(badge) => {
            if doc.set_text(badge, &text) {
                BadgeChange::Updated
            } else {
                BadgeChange::Unchanged
            }
        }
        None => {
            let badge = doc.create_element("div");
            doc.set_attr(badge, "id", BADGE_ID);
            doc.set_attr(badge, "class", BADGE_CLASS);
            doc.set_text(badge, &text);
            let body = doc.body();
            doc.append_child(body, badge);
            BadgeChange::Created
        }
    }
}

pub fn remove_badge(doc: &mut Document) -> bool {
    match doc.element_by_id(BADGE_ID) {
        Some(badge) => doc.remove(badge),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterRegistry;
    use std::sync::Arc;

    fn soundcloud() -> Arc<HostAdapter> {
        AdapterRegistry::new().resolve("soundcloud.com").unwrap()
    }

    fn add_duration(doc: &mut Document, text: &str) {
        let el = doc.create_element("span");
        doc.set_attr(el, "class", "trackItem__duration");
        doc.set_text(el, text);
        let body = doc.body();
        doc.append_child(body, el);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3:45"), Some(225));
        assert_eq!(parse_duration("1:02:03"), Some(3723));
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration(" 4:05 "), Some(245));
        assert_eq!(parse_duration("4:5"), None);
        assert_eq!(parse_duration("Duration 3:45"), None);
    }

    #[test]
    fn test_oversized_durations_do_not_overflow() {
        assert_eq!(parse_duration("5000000000000000000:00"), None);
        assert_eq!(parse_duration("99999999999999999999:00"), None);
        assert_eq!(parse_duration("5000000000000000:00:00"), None);

        let mut doc = Document::new();
        let adapter = soundcloud();
        add_duration(&mut doc, "300000000000000000:00");
        add_duration(&mut doc, "300000000000000000:00");
        add_duration(&mut doc, "5000000000000000000:00");
        assert_eq!(total_seconds(&doc, &adapter), u64::MAX);
        assert_eq!(render(&mut doc, &adapter, 25), BadgeChange::Created);
    }

    #[test]
    fn test_badge_comparisons() {
        let matches = badge_text(30 * 60, 25);
        assert!(matches.contains("matches"), "{}", matches);

        let longer = badge_text(40 * 60, 25);
        assert!(longer.contains("15") && longer.contains("longer"), "{}", longer);

        let shorter = badge_text(10 * 60, 25);
        assert!(shorter.contains("15 min shorter"), "{}", shorter);

        assert_eq!(badge_text(90, 0), "Listening time: 2 min");
    }

    #[test]
    fn test_render_lifecycle() {
        let mut doc = Document::new();
        let adapter = soundcloud();
        assert_eq!(render(&mut doc, &adapter, 25), BadgeChange::Unchanged);

        add_duration(&mut doc, "20:00");
        add_duration(&mut doc, "abc");
        assert_eq!(render(&mut doc, &adapter, 25), BadgeChange::Created);
        assert_eq!(render(&mut doc, &adapter, 25), BadgeChange::Unchanged);

        add_duration(&mut doc, "20:00");
        assert_eq!(render(&mut doc, &adapter, 25), BadgeChange::Updated);
        let badge = doc.element_by_id(BADGE_ID).unwrap();
        assert!(doc.text_content(badge).contains("15 min longer"));

        for id in doc.elements_with_class("trackItem__duration") {
            doc.remove(id);
        }
        assert_eq!(render(&mut doc, &adapter, 25), BadgeChange::Removed);
        assert!(doc.element_by_id(BADGE_ID).is_none());
    }
}
