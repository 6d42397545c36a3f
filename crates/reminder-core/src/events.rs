use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notification::Notification;

/// Where a candidate set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Short-interval snapshot poll.
    Snapshot,
    /// Snapshot fetched because the long poll reported new data.
    LongPoll,
    /// The persisted slot (change signal or remote fallback).
    Slot,
    /// Injected through the handle.
    Manual,
}

/// Why a shown notification left the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    Timeout,
    Closed,
}

/// Every state change in the reminder service produces an Event.
/// Surfaces render from them; observers subscribe through the handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    NotificationShown {
        notification: Notification,
        index: usize,
        total: usize,
        display_ms: u64,
        at: DateTime<Utc>,
    },
    NotificationDismissed {
        id: Option<String>,
        reason: DismissReason,
        at: DateTime<Utc>,
    },
    /// Left the screen without being consumed (navigation gap or clear).
    NotificationHidden {
        at: DateTime<Utc>,
    },
    NavigationStarted {
        from_index: usize,
        to_index: usize,
        at: DateTime<Utc>,
    },
    CandidatesIngested {
        source: SourceKind,
        candidates: usize,
        eligible: usize,
        queued: usize,
        at: DateTime<Utc>,
    },
    SeenReset {
        cleared: usize,
        at: DateTime<Utc>,
    },
    SourceFailed {
        source: SourceKind,
        message: String,
        at: DateTime<Utc>,
    },
}
