//! Mutation watching over the page tree.
//!
//! The watcher does not decide what changed matters: every non-empty batch
//! re-triggers a pass, and marker gating makes the pass that follows the
//! engine's own writes a no-op. That is what ends the cycle.

use crate::dom::{Document, MutationRecord, NodeId};
use tracing::{debug, trace};

/// Records drained from the page in one go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct targets in first-seen order
    pub fn targets(&self) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for record in &self.records {
            let target = record.target();
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }
}

/// Subtree observer on the page with a bound on back-to-back passes
pub struct MutationWatcher {
    max_rounds: usize,
    connected: bool,
    batches_seen: u64,
}

impl MutationWatcher {
    pub fn new(max_rounds: usize) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            connected: false,
            batches_seen: 0,
        }
    }

    /// Start observing. Anything queued before now is discarded.
    pub fn connect(&mut self, doc: &mut Document) {
        if self.connected {
            return;
        }
        doc.disconnect();
        doc.observe();
        self.connected = true;
        debug!("Mutation watcher connected");
    }

    pub fn disconnect(&mut self, doc: &mut Document) {
        if !self.connected {
            return;
        }
        doc.disconnect();
        self.connected = false;
        debug!("Mutation watcher disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Drain pending records, if there are any
    pub fn take_batch(&mut self, doc: &mut Document) -> Option<MutationBatch> {
        if !self.connected {
            return None;
        }
        let records = doc.take_records();
        if records.is_empty() {
            return None;
        }

        self.batches_seen += 1;
        let batch = MutationBatch { records };
        trace!(
            "Mutation batch {}: {} records on {} targets",
            self.batches_seen,
            batch.len(),
            batch.targets().len()
        );
        Some(batch)
    }

    /// Most passes run for one trigger before the watcher gives up
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn batches_seen(&self) -> u64 {
        self.batches_seen
    }
}

impl Default for MutationWatcher {
    fn default() -> Self {
        Self::new(16)
    }
}
