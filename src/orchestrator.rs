//! Orchestration of declutter, mood filtering, summaries and listening time
//! over one live page.
//!
//! Everything runs on one cooperative sequence. A pass never awaits: it
//! writes markers, sends requests and returns. Replies sit in an in-flight
//! set and are applied one at a time as they complete, in whatever order
//! that turns out to be.

use crate::adapters::{AdapterRegistry, HostAdapter};
use crate::channel::{MessageChannel, PendingReply};
use crate::config::{Config, SummaryConfig};
use crate::declutter::{self, DeclutterReport};
use crate::dom::{Document, NodeId};
use crate::listening_time::{self, BadgeChange};
use crate::settings::{Settings, SettingsState, Transition};
use crate::summary::{self, SummaryOutcome};
use crate::tiles::{self, Verdict};
use crate::types::{ContentMessage, Request, Response};
use crate::watcher::MutationWatcher;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// A reply that has come back, tagged with what it was for
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub target: NodeId,
    /// Epoch of the feature when the request was sent
    pub epoch: u64,
    pub response: Response,
}

type InFlight = Pin<Box<dyn Future<Output = Completion> + Send>>;

/// Why a completion was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The feature was cleared or torn down after the request went out
    StaleEpoch,
    /// The engine or the feature is off
    Disabled,
    /// The node is gone or no longer waiting for this reply
    NotPending,
}

/// What applying one completion did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Dropped(DropReason),
    Tile(Verdict),
    Summary(SummaryOutcome),
}

/// Everything one pass changed or sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Disabled or unsupported host; nothing was looked at
    pub inert: bool,
    pub declutter: DeclutterReport,
    pub verdicts_refreshed: usize,
    pub tiles_dispatched: usize,
    pub tiles_already_processed: usize,
    pub tiles_unusable: usize,
    pub tiles_cleared: usize,
    pub summary_requested: bool,
    pub summary_cleared: usize,
    pub badge: Option<BadgeChange>,
}

impl PassReport {
    fn inert() -> Self {
        Self {
            inert: true,
            ..Default::default()
        }
    }

    /// Requests sent by the pass
    pub fn requests(&self) -> usize {
        self.tiles_dispatched + usize::from(self.summary_requested)
    }
}

/// Events fed to [`Orchestrator::run`]
pub enum PageEvent {
    /// Settings pushed by the popup
    Message(ContentMessage),
    /// The host page changing itself
    Mutate(Box<dyn FnOnce(&mut Document) + Send>),
    /// A user click on a node
    Click(NodeId),
}

#[derive(Debug, Clone, Copy, Default)]
struct Epochs {
    mood: u64,
    summary: u64,
}

/// The page engine
pub struct Orchestrator {
    doc: Document,
    host: String,
    settings: SettingsState,
    adapter: Option<Arc<HostAdapter>>,
    watcher: MutationWatcher,
    channel: MessageChannel,
    summary_config: SummaryConfig,
    in_flight: FuturesUnordered<InFlight>,
    epochs: Epochs,
}

impl Orchestrator {
    /// Engine for `doc` served at `host`, using the built-in adapters
    pub fn new(doc: Document, host: &str, config: &Config, channel: MessageChannel) -> Self {
        Self::with_registry(doc, host, config, channel, &AdapterRegistry::new())
    }

    pub fn with_registry(
        doc: Document,
        host: &str,
        config: &Config,
        channel: MessageChannel,
        registry: &AdapterRegistry,
    ) -> Self {
        let adapter = registry.resolve(host);
        match &adapter {
            Some(a) => info!("Page {} uses adapter {}", host, a.key),
            None => info!("Page {} is not a supported site, staying inert", host),
        }

        Self {
            doc,
            host: host.to_string(),
            settings: SettingsState::new(config.settings.clone()),
            adapter,
            watcher: MutationWatcher::new(config.watcher.max_rounds),
            channel,
            summary_config: config.summary.clone(),
            in_flight: FuturesUnordered::new(),
            epochs: Epochs::default(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The page, for host-side changes. Changes are picked up by the watcher.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn adapter(&self) -> Option<&HostAdapter> {
        self.adapter.as_deref()
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.snapshot()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_connected()
    }

    /// Replies not yet come back
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn is_live(&self) -> bool {
        self.settings.is_enabled() && self.adapter.is_some()
    }

    /// First pass and watcher hookup
    pub fn start(&mut self) -> PassReport {
        if !self.is_live() {
            debug!("Not starting on {}: disabled or unsupported", self.host);
            return PassReport::inert();
        }
        info!("Starting on {}", self.host);
        let report = self.run_pass();
        self.watcher.connect(&mut self.doc);
        report
    }

    /// Apply a settings push from the popup
    pub fn handle_message(&mut self, message: ContentMessage) -> PassReport {
        let ContentMessage::ApplySettings { payload } = message;
        let update = self.settings.apply_partial(&payload);

        match update.transition {
            Transition::Enabled => {
                info!("Enabled on {}", self.host);
                self.start()
            }
            Transition::Disabled => {
                info!("Disabled on {}", self.host);
                self.teardown();
                PassReport::inert()
            }
            Transition::Unchanged if update.changed && self.is_live() => {
                debug!("Settings changed, reconciling {}", self.host);
                self.run_pass()
            }
            Transition::Unchanged => PassReport::inert(),
        }
    }

    /// One orchestration pass against the current settings snapshot
    pub fn run_pass(&mut self) -> PassReport {
        let adapter = match (&self.adapter, self.settings.is_enabled()) {
            (Some(adapter), true) => Arc::clone(adapter),
            _ => return PassReport::inert(),
        };
        let settings = self.settings.snapshot();
        let mut report = PassReport {
            declutter: declutter::apply(&mut self.doc, &adapter, &settings),
            ..Default::default()
        };

        if settings.mood_filter_enabled {
            report.verdicts_refreshed = tiles::refresh_verdicts(&mut self.doc, &settings);
            let scan = tiles::scan(&mut self.doc, &adapter, &settings);
            report.tiles_already_processed = scan.already_processed;
            report.tiles_unusable = scan.unusable;
            report.tiles_dispatched = scan.dispatch.len();
            for (target, request) in scan.dispatch {
                let epoch = self.epochs.mood;
                self.dispatch(target, epoch, request);
            }
        } else {
            report.tiles_cleared = tiles::suspend(&mut self.doc);
            if report.tiles_cleared > 0 {
                self.epochs.mood += 1;
            }
        }

        if settings.enable_summary {
            if let Some((target, request)) =
                summary::request(&mut self.doc, &adapter, &self.summary_config)
            {
                let epoch = self.epochs.summary;
                self.dispatch(target, epoch, request);
                report.summary_requested = true;
            }
        } else {
            report.summary_cleared = summary::clear(&mut self.doc);
            if report.summary_cleared > 0 {
                self.epochs.summary += 1;
            }
        }

        report.badge = Some(if settings.show_listening_time {
            listening_time::render(&mut self.doc, &adapter, settings.target_minutes)
        } else if listening_time::remove_badge(&mut self.doc) {
            BadgeChange::Removed
        } else {
            BadgeChange::Unchanged
        });

        trace!("Pass on {}: {:?}", self.host, report);
        report
    }

    fn dispatch(&mut self, target: NodeId, epoch: u64, request: Request) {
        trace!("Sending {} for {}", request.kind(), target);
        let reply: PendingReply = self.channel.send(request);
        self.in_flight.push(Box::pin(async move {
            Completion {
                target,
                epoch,
                response: reply.await,
            }
        }));
    }

    /// Apply one reply if it still applies
    pub fn apply_completion(&mut self, completion: Completion) -> CompletionOutcome {
        let settings = self.settings.snapshot();
        let Completion {
            target,
            epoch,
            response,
        } = completion;

        let outcome = match response {
            Response::Classification(reply) => {
                if epoch != self.epochs.mood {
                    CompletionOutcome::Dropped(DropReason::StaleEpoch)
                } else if !self.is_live() || !settings.mood_filter_enabled {
                    CompletionOutcome::Dropped(DropReason::Disabled)
                } else {
                    match tiles::apply_verdict(&mut self.doc, target, &reply, &settings) {
                        Verdict::Dropped => CompletionOutcome::Dropped(DropReason::NotPending),
                        verdict => CompletionOutcome::Tile(verdict),
                    }
                }
            }
            Response::Summary(reply) => {
                if epoch != self.epochs.summary {
                    CompletionOutcome::Dropped(DropReason::StaleEpoch)
                } else if !self.is_live() || !settings.enable_summary {
                    CompletionOutcome::Dropped(DropReason::Disabled)
                } else {
                    match summary::apply(&mut self.doc, target, &reply) {
                        SummaryOutcome::Dropped => {
                            CompletionOutcome::Dropped(DropReason::NotPending)
                        }
                        applied => CompletionOutcome::Summary(applied),
                    }
                }
            }
        };

        trace!("Completion for {}: {:?}", target, outcome);
        outcome
    }

    /// Wait for the next reply and apply it. `None` once nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<CompletionOutcome> {
        let completion = self.in_flight.next().await?;
        Some(self.apply_completion(completion))
    }

    /// Re-run passes while the page keeps changing, up to the round bound.
    /// Returns the number of passes run.
    pub fn pump_mutations(&mut self) -> usize {
        let mut rounds = 0;
        while let Some(batch) = self.watcher.take_batch(&mut self.doc) {
            if rounds >= self.watcher.max_rounds() {
                warn!(
                    "Page {} still changing after {} passes, waiting for the next trigger",
                    self.host, rounds
                );
                break;
            }
            trace!("Pass triggered by {} mutations", batch.len());
            self.run_pass();
            rounds += 1;
        }
        rounds
    }

    /// Apply every outstanding reply and every pass they trigger.
    /// Returns the number of completions handled.
    pub async fn settle(&mut self) -> usize {
        let mut handled = 0;
        self.pump_mutations();
        while self.next_completion().await.is_some() {
            handled += 1;
            self.pump_mutations();
        }
        debug!("Settled {} completions on {}", handled, self.host);
        handled
    }

    /// Deliver a user click and react to what it changed
    pub fn click(&mut self, node: NodeId) -> usize {
        let fired = self.doc.dispatch_click(node);
        self.pump_mutations();
        fired
    }

    /// Reverse every reversible effect and stop watching.
    ///
    /// Replies still in flight are left to arrive and are dropped on epoch.
    pub fn teardown(&mut self) -> usize {
        self.watcher.disconnect(&mut self.doc);
        self.epochs.mood += 1;
        self.epochs.summary += 1;

        let changes = declutter::reveal_layout(&mut self.doc)
            + tiles::clear(&mut self.doc)
            + summary::clear(&mut self.doc)
            + usize::from(listening_time::remove_badge(&mut self.doc))
            + declutter::clear_root(&mut self.doc);

        info!("Teardown on {} reversed {} changes", self.host, changes);
        changes
    }

    /// Serve page events and replies until the event source closes, then
    /// settle what is left
    pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<PageEvent>) {
        self.start();
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.apply_completion(completion);
                    self.pump_mutations();
                }
            }
        }
        self.settle().await;
    }

    fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::Message(message) => {
                self.handle_message(message);
            }
            PageEvent::Mutate(change) => {
                change(&mut self.doc);
            }
            PageEvent::Click(node) => {
                self.doc.dispatch_click(node);
            }
        }
        self.pump_mutations();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::markers::{ACTIVE_CLASS, BLURRED_CLASS, MOOD_ATTR, MOOD_PENDING};
    use crate::settings::PartialSettings;
    use crate::types::ClassificationResponse;

    fn tile(doc: &mut Document, title: &str) -> NodeId {
        let row = doc.create_element("div");
        doc.set_attr(row, "data-testid", "tracklist-row");
        let link = doc.create_element("a");
        doc.set_attr(link, "data-testid", "internal-track-link");
        doc.set_text(link, title);
        doc.append_child(row, link);
        let body = doc.body();
        doc.append_child(body, row);
        row
    }

    fn mood_config() -> Config {
        let mut config = Config::default();
        config.settings.mood_filter_enabled = true;
        config
    }

    #[tokio::test]
    async fn test_unknown_host_is_inert() {
        let (channel, _rx) = MessageChannel::new();
        let mut doc = Document::new();
        tile(&mut doc, "Tears");
        let mut engine = Orchestrator::new(doc, "example.com", &mood_config(), channel);

        assert!(engine.start().inert);
        assert!(!engine.is_watching());
        assert_eq!(engine.in_flight(), 0);
        assert!(!engine.document().has_class(engine.document().root(), ACTIVE_CLASS));
    }

    #[tokio::test]
    async fn test_pass_is_idempotent() {
        let (channel, _rx) = MessageChannel::new();
        let mut doc = Document::new();
        tile(&mut doc, "Tears");
        let mut engine = Orchestrator::new(doc, "open.spotify.com", &mood_config(), channel);

        let first = engine.start();
        assert_eq!(first.tiles_dispatched, 1);

        let second = engine.run_pass();
        assert_eq!(second.requests(), 0);
        assert_eq!(second.declutter.total(), 0);
        assert_eq!(engine.pump_mutations(), 0);
        assert_eq!(engine.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_stale_epoch_is_dropped() {
        let (channel, _rx) = MessageChannel::new();
        let mut doc = Document::new();
        let row = tile(&mut doc, "Tears");
        let mut engine = Orchestrator::new(doc, "open.spotify.com", &mood_config(), channel);
        engine.start();
        assert_eq!(engine.document().attr(row, MOOD_ATTR), Some(MOOD_PENDING));

        let outcome = engine.apply_completion(Completion {
            target: row,
            epoch: 7,
            response: Response::Classification(ClassificationResponse::label("sadness", 0.9)),
        });
        assert_eq!(outcome, CompletionOutcome::Dropped(DropReason::StaleEpoch));
        assert!(!engine.document().has_class(row, BLURRED_CLASS));
    }

    #[tokio::test]
    async fn test_mood_filter_off_clears_and_drops_late_replies() {
        let (channel, handle) = MessageChannel::spawn(Arc::new(LocalBackend::rules_only()));
        let mut doc = Document::new();
        let row = tile(&mut doc, "Tears");
        let mut engine = Orchestrator::new(doc, "open.spotify.com", &mood_config(), channel);
        engine.start();

        let report = engine.handle_message(ContentMessage::ApplySettings {
            payload: PartialSettings {
                mood_filter_enabled: Some(false),
                ..Default::default()
            },
        });
        assert_eq!(report.tiles_cleared, 1);
        assert!(!engine.document().has_attr(row, MOOD_ATTR));

        assert_eq!(
            engine.next_completion().await,
            Some(CompletionOutcome::Dropped(DropReason::StaleEpoch))
        );
        assert!(!engine.document().has_class(row, BLURRED_CLASS));
        handle.abort();
    }
}
