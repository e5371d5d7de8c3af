//! Names of every class, attribute and element id the engine writes into the page.
//!
//! These markers are the only record of what has been done to the page:
//! passes consult them to skip finished work and teardown uses them alone
//! to reverse it.

/// Root class present whenever the engine is active on the page
pub const ACTIVE_CLASS: &str = "calm-active";
/// Root class present while minimal layout is on
pub const MINIMAL_CLASS: &str = "calm-minimal";
/// Root class present while motion suppression is on
pub const STILL_CLASS: &str = "calm-still";

/// All root classes, for teardown
pub const ROOT_CLASSES: &[&str] = &[ACTIVE_CLASS, MINIMAL_CLASS, STILL_CLASS];

/// Stylesheet giving the markers their visual effect
pub const STYLE_ID: &str = "calm-declutter-style";

/// Layout element hidden by minimal layout
pub const HIDDEN_CLASS: &str = "calm-hidden";

/// Element whose animation/playback was suppressed (not reversible)
pub const STILL_ATTR: &str = "data-calm-still";

/// Tile processed by the mood pipeline; value is `pending` until a verdict lands
pub const MOOD_ATTR: &str = "data-calm-mood";
pub const MOOD_PENDING: &str = "pending";
pub const MOOD_CLEAR: &str = "clear";
pub const MOOD_BLOCKED: &str = "blocked";
pub const MOOD_REVEALED: &str = "revealed";
/// Tile had no classifiable text; left unfiltered
pub const MOOD_SKIPPED: &str = "skipped";

/// Blurred tile treatment
pub const BLURRED_CLASS: &str = "calm-blurred";
pub const EMOTION_ATTR: &str = "data-calm-emotion";
pub const LABEL_CLASS: &str = "calm-mood-label";
/// Owner key for the reveal click listener
pub const REVEAL_LISTENER: &str = "calm-reveal";

/// Summary target marker; value is `pending`, `done` or `empty`
pub const SUMMARY_ATTR: &str = "data-calm-summary";
pub const SUMMARY_PENDING: &str = "pending";
pub const SUMMARY_DONE: &str = "done";
pub const SUMMARY_EMPTY: &str = "empty";
pub const SUMMARY_BOX_CLASS: &str = "calm-summary-box";

/// Listening-time badge element id
pub const BADGE_ID: &str = "calm-listening-badge";
pub const BADGE_CLASS: &str = "calm-listening-badge";

/// Stylesheet injected into the page head while active
pub const STYLESHEET: &str = r#"
.calm-hidden { display: none !important; }
.calm-still *, .calm-still *::before, .calm-still *::after { animation: none !important; transition: none !important; }
.calm-active body { font-family: 'OpenDyslexic', Arial, sans-serif; line-height: 1.6; letter-spacing: 0.05em; }
.calm-blurred { position: relative; cursor: pointer; }
.calm-blurred > :not(.calm-mood-label) { filter: blur(8px); }
.calm-mood-label { position: absolute; top: 4px; left: 4px; padding: 2px 6px; border-radius: 4px; background: #222; color: #f5f5f5; font-size: 11px; }
.calm-summary-box { margin: 8px 0; padding: 12px; border-radius: 8px; background: #f5f5f5; color: #222; }
.calm-listening-badge { position: fixed; right: 16px; bottom: 16px; padding: 6px 10px; border-radius: 12px; background: #f5f5f5; color: #222; z-index: 2147483647; }
"#;
