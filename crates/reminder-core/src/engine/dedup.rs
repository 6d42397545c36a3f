//! Dedup & selection.
//!
//! Per identity the state is `Unseen -> Shown`, monotonic within a session.
//! Only [`DedupEngine::reset_seen`] (the periodic deep check) moves
//! identities back to `Unseen`. Untrackable notifications have no identity
//! and are never suppressed.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::events::SourceKind;
use crate::notification::{Notification, NotificationSet};

/// What the presenter should do after an ingest.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Replace the display queue and start from the first entry.
    Present(NotificationSet),
    /// Nothing left to show; hide whatever is up.
    Clear,
    /// Still nothing to show, same as last time. Touch nothing.
    Unchanged,
}

/// Counters for one ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub source: SourceKind,
    pub candidates: usize,
    pub eligible: usize,
    pub queued: usize,
}

#[derive(Debug, Clone)]
pub struct DedupEngine {
    seen: HashSet<String>,
    /// Whether the previous ingest left an empty queue.
    last_queue_empty: bool,
}

impl DedupEngine {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
            last_queue_empty: true,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Filter `candidates` to eligible, not-yet-shown notifications.
    ///
    /// Source order is kept. The last processed ingest wins the queue no
    /// matter which source it came from; shown marks are shared.
    pub fn ingest(
        &mut self,
        candidates: NotificationSet,
        source: SourceKind,
        now: DateTime<Utc>,
    ) -> (Selection, IngestReport) {
        let total = candidates.len();
        let eligible: Vec<Notification> = candidates
            .into_iter()
            .filter(|n| n.is_eligible(now))
            .collect();
        let eligible_count = eligible.len();

        let queue: NotificationSet = eligible
            .into_iter()
            .filter(|n| n.identity().map_or(true, |id| !self.seen.contains(id)))
            .collect();

        let report = IngestReport {
            source,
            candidates: total,
            eligible: eligible_count,
            queued: queue.len(),
        };

        let selection = if !queue.is_empty() {
            self.last_queue_empty = false;
            Selection::Present(queue)
        } else if self.last_queue_empty {
            Selection::Unchanged
        } else {
            self.last_queue_empty = true;
            Selection::Clear
        };

        tracing::debug!(
            ?source,
            candidates = report.candidates,
            eligible = report.eligible,
            queued = report.queued,
            "ingest"
        );
        (selection, report)
    }

    /// `Unseen -> Shown`. Returns `false` if it was already shown.
    pub fn mark_shown(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    /// Forget every shown identity. Returns how many were cleared.
    pub fn reset_seen(&mut self) -> usize {
        let cleared = self.seen.len();
        self.seen.clear();
        cleared
    }
}

impl Default for DedupEngine {
    fn default() -> Self {
        Self::new()
    }
}
