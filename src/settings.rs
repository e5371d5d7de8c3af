//! User settings: the snapshot every orchestration pass runs against.
//!
//! Updates arrive as partial records from the settings popup. They are merged
//! into a new immutable snapshot which replaces the old one wholesale, so a
//! pass never observes a half-applied update.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// How tiles are classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodMethod {
    /// Keyword lexicon scoring, deterministic
    #[default]
    Rules,
    /// Emotion model behind the classification proxy
    Ml,
}

impl MoodMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodMethod::Rules => "rules",
            MoodMethod::Ml => "ml",
        }
    }
}

/// Full settings record. Missing fields back-fill from the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub master_enabled: bool,
    pub hide_promos: bool,
    pub reduce_motion: bool,
    pub minimal_layout: bool,
    pub mood_filter_enabled: bool,
    pub blocked_emotions: BTreeSet<String>,
    pub mood_method: MoodMethod,
    pub show_listening_time: bool,
    #[serde(deserialize_with = "lenient_minutes")]
    pub target_minutes: u32,
    pub enable_summary: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_enabled: true,
            hide_promos: true,
            reduce_motion: true,
            minimal_layout: false,
            mood_filter_enabled: false,
            blocked_emotions: BTreeSet::from(["sadness".to_string()]),
            mood_method: MoodMethod::Rules,
            show_listening_time: true,
            target_minutes: 25,
            enable_summary: false,
        }
    }
}

/// Partial update pushed by the settings popup
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_promos: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_motion: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal_layout: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_filter_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_emotions: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_method: Option<MoodMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_listening_time: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_minutes_opt"
    )]
    pub target_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_summary: Option<bool>,
}

/// The popup sends `Number(input) || 0`, so accept any number and clamp
fn lenient_minutes<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_minutes(raw))
}

fn lenient_minutes_opt<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(clamp_minutes))
}

fn clamp_minutes(raw: f64) -> u32 {
    if raw.is_finite() && raw > 0.0 {
        raw.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

impl Settings {
    /// Shallow merge: present fields override, the emotion set is replaced whole
    pub fn merged(&self, update: &PartialSettings) -> Settings {
        let mut next = self.clone();
        if let Some(v) = update.master_enabled {
            next.master_enabled = v;
        }
        if let Some(v) = update.hide_promos {
            next.hide_promos = v;
        }
        if let Some(v) = update.reduce_motion {
            next.reduce_motion = v;
        }
        if let Some(v) = update.minimal_layout {
            next.minimal_layout = v;
        }
        if let Some(v) = update.mood_filter_enabled {
            next.mood_filter_enabled = v;
        }
        if let Some(v) = &update.blocked_emotions {
            next.blocked_emotions = v.clone();
        }
        if let Some(v) = update.mood_method {
            next.mood_method = v;
        }
        if let Some(v) = update.show_listening_time {
            next.show_listening_time = v;
        }
        if let Some(v) = update.target_minutes {
            next.target_minutes = v;
        }
        if let Some(v) = update.enable_summary {
            next.enable_summary = v;
        }
        next.normalized()
    }

    /// Emotion labels compare lowercase and trimmed
    pub fn normalized(mut self) -> Settings {
        self.blocked_emotions = self
            .blocked_emotions
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn is_blocked(&self, emotion: &str) -> bool {
        self.blocked_emotions.contains(&emotion.trim().to_lowercase())
    }
}

/// Master-switch change produced by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// false → true: run a full apply pass
    Enabled,
    /// true → false: run a full teardown
    Disabled,
    /// Master switch unchanged
    Unchanged,
}

/// Result of merging an update
#[derive(Debug, Clone)]
pub struct SettingsUpdate {
    pub snapshot: Arc<Settings>,
    pub transition: Transition,
    /// Whether any field actually changed
    pub changed: bool,
}

/// Holder of the last-applied settings snapshot
#[derive(Debug, Clone)]
pub struct SettingsState {
    current: Arc<Settings>,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsState {
    pub fn new(initial: Settings) -> Self {
        Self {
            current: Arc::new(initial.normalized()),
        }
    }

    /// The current snapshot, cheap to clone and never mutated
    pub fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.current)
    }

    pub fn is_enabled(&self) -> bool {
        self.current.master_enabled
    }

    /// Merge an update and swap in the new snapshot
    pub fn apply_partial(&mut self, update: &PartialSettings) -> SettingsUpdate {
        let next = self.current.merged(update);
        let changed = next != *self.current;
        let transition = match (self.current.master_enabled, next.master_enabled) {
            (false, true) => Transition::Enabled,
            (true, false) => Transition::Disabled,
            _ => Transition::Unchanged,
        };

        debug!(
            "Settings update: changed={} transition={:?}",
            changed, transition
        );

        self.current = Arc::new(next);
        SettingsUpdate {
            snapshot: self.snapshot(),
            transition,
            changed,
        }
    }
}
