//! Declutterer - reactive declutter and mood-classification engine
//!
//! Runs against a live, continuously re-rendering music-streaming page:
//!
//! - **Declutter**: removes promos, stills motion, hides side panels
//! - **Mood filter**: classifies each content tile and blurs blocked moods
//! - **Summary**: injects a generated summary into the page header
//! - **Listening time**: totals track durations against a target
//!
//! # Architecture
//!
//! The [`Orchestrator`] owns the page tree and runs one pass per trigger
//! (settings push or mutation batch). Every change it makes is recorded as a
//! marker on the page itself, which is what makes passes idempotent and
//! teardown exact. Classification and summaries go over a [`MessageChannel`]
//! to a [`MoodBackend`] and are applied whenever their replies arrive.

pub mod adapters;
pub mod backend;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod declutter;
pub mod dom;
pub mod listening_time;
pub mod markers;
pub mod native;
pub mod orchestrator;
pub mod proxy;
pub mod settings;
pub mod summary;
pub mod tiles;
pub mod types;
pub mod watcher;

// Re-export commonly used types
pub use adapters::{AdapterRegistry, HostAdapter};
pub use backend::{LocalBackend, MoodBackend};
pub use channel::{MessageChannel, PendingReply};
pub use classifier::{classify_rules, ML_MIN_SCORE, RULES_MIN_SCORE};
pub use config::Config;
pub use dom::{Document, NodeId, PageSnapshot, Selector};
pub use orchestrator::{Completion, CompletionOutcome, DropReason, Orchestrator, PageEvent, PassReport};
pub use proxy::{ProxyClient, ProxyError};
pub use settings::{MoodMethod, PartialSettings, Settings, SettingsState, Transition};
pub use types::{ClassificationResponse, ContentMessage, Request, Response, SummaryResponse};
pub use watcher::MutationWatcher;
