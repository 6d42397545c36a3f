//! Presentation scheduler.
//!
//! A wall-clock-free state machine. It owns no timers: transitions that need
//! one (a fresh `NotificationShown`, a `NavigationStarted`) tell the caller
//! to arm it, and the caller reports back with the generation it was armed
//! with. Every transition bumps the generation, so a timer that outlived its
//! notification is recognized as stale and ignored.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Showing(i) -> Idle                      (timeout / close)
//!         Showing(i) -> Switching(j) -> Showing(j) (next / previous)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::events::{DismissReason, Event};
use crate::notification::{Notification, NotificationSet};
use crate::surface::Slide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PresenterState {
    Idle,
    Showing { index: usize },
    /// Brief gap between two notifications while navigating.
    Switching { to: usize },
}

#[derive(Debug, Clone)]
pub struct Presenter {
    queue: NotificationSet,
    state: PresenterState,
    generation: u64,
    default_display: Duration,
}

impl Presenter {
    pub fn new(default_display: Duration) -> Self {
        Self {
            queue: Vec::new(),
            state: PresenterState::Idle,
            generation: 0,
            default_display,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> PresenterState {
        self.state
    }

    /// Generation a timer armed right now must carry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn queue(&self) -> &[Notification] {
        &self.queue
    }

    /// The notification on screen, if any.
    pub fn current(&self) -> Option<&Notification> {
        match self.state {
            PresenterState::Showing { index } => self.queue.get(index),
            _ => None,
        }
    }

    pub fn slide(&self) -> Option<Slide> {
        match self.state {
            PresenterState::Showing { index } => self.queue.get(index).map(|n| Slide {
                notification: n.clone(),
                index,
                total: self.queue.len(),
            }),
            _ => None,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Replace the queue.
    ///
    /// If the notification in focus is still queued it stays up and keeps
    /// its timer; otherwise the first entry is shown. An untrackable
    /// notification is matched by position and text.
    pub fn present(&mut self, queue: NotificationSet) -> Option<Event> {
        if queue.is_empty() {
            return self.clear();
        }

        let focus = match self.state {
            PresenterState::Showing { index } | PresenterState::Switching { to: index } => Some(index),
            PresenterState::Idle => None,
        };
        let kept = focus.and_then(|index| {
            let focused = self.queue.get(index)?;
            match focused.identity() {
                Some(id) => queue.iter().position(|n| n.identity() == Some(id)),
                None => queue
                    .get(index)
                    .filter(|n| {
                        n.identity().is_none()
                            && n.title == focused.title
                            && n.content == focused.content
                    })
                    .map(|_| index),
            }
        });

        self.queue = queue;
        match (kept, self.state) {
            (Some(index), PresenterState::Showing { .. }) => {
                self.state = PresenterState::Showing { index };
                None
            }
            (Some(to), PresenterState::Switching { .. }) => {
                self.state = PresenterState::Switching { to };
                None
            }
            _ => self.show(0),
        }
    }

    /// Drop the queue and hide. No-op when already idle with nothing queued.
    pub fn clear(&mut self) -> Option<Event> {
        let was_idle = self.state == PresenterState::Idle;
        if was_idle && self.queue.is_empty() {
            return None;
        }
        self.queue.clear();
        if was_idle {
            return None;
        }
        self.state = PresenterState::Idle;
        self.generation += 1;
        Some(Event::NotificationHidden { at: Utc::now() })
    }

    /// User closed the notification. Consumes it like a timeout would.
    pub fn close(&mut self) -> Option<Event> {
        match self.state {
            PresenterState::Showing { index } => Some(self.dismiss(index, DismissReason::Closed)),
            PresenterState::Switching { .. } => {
                self.state = PresenterState::Idle;
                self.generation += 1;
                Some(Event::NotificationHidden { at: Utc::now() })
            }
            PresenterState::Idle => None,
        }
    }

    pub fn next(&mut self) -> Option<Event> {
        self.navigate(1)
    }

    pub fn previous(&mut self) -> Option<Event> {
        self.navigate(-1)
    }

    /// Auto-dismiss timer fired.
    pub fn dismiss_elapsed(&mut self, generation: u64) -> Option<Event> {
        if generation != self.generation {
            return None;
        }
        match self.state {
            PresenterState::Showing { index } => Some(self.dismiss(index, DismissReason::Timeout)),
            _ => None,
        }
    }

    /// Navigation gap elapsed.
    pub fn transition_elapsed(&mut self, generation: u64) -> Option<Event> {
        if generation != self.generation {
            return None;
        }
        match self.state {
            PresenterState::Switching { to } => self.show(to),
            _ => None,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn show(&mut self, index: usize) -> Option<Event> {
        let notification = self.queue.get(index)?.clone();
        self.state = PresenterState::Showing { index };
        self.generation += 1;
        let display_ms = notification.display_for(self.default_display).as_millis() as u64;
        Some(Event::NotificationShown {
            notification,
            index,
            total: self.queue.len(),
            display_ms,
            at: Utc::now(),
        })
    }

    fn dismiss(&mut self, index: usize, reason: DismissReason) -> Event {
        let id = self.queue.get(index).and_then(|n| n.id.clone());
        self.state = PresenterState::Idle;
        self.generation += 1;
        Event::NotificationDismissed {
            id,
            reason,
            at: Utc::now(),
        }
    }

    /// Presentation-only: nothing is marked as shown.
    fn navigate(&mut self, step: isize) -> Option<Event> {
        let PresenterState::Showing { index } = self.state else {
            return None;
        };
        let len = self.queue.len();
        if len < 2 {
            return None;
        }
        let to = (index as isize + step).rem_euclid(len as isize) as usize;
        self.state = PresenterState::Switching { to };
        self.generation += 1;
        Some(Event::NavigationStarted {
            from_index: index,
            to_index: to,
            at: Utc::now(),
        })
    }
}
