//! Display surface seam.

use serde::{Deserialize, Serialize};

use crate::notification::Notification;

/// What is on screen: one notification and its place in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub notification: Notification,
    pub index: usize,
    pub total: usize,
}

/// Anything that can put a notification on screen.
///
/// The reminder service owns the surface and calls `render` from its single
/// task, so implementations need no locking of their own.
pub trait DisplaySurface: Send + 'static {
    /// `Some` replaces what is shown; `None` hides it.
    fn render(&mut self, slide: Option<&Slide>);
}

/// Surface that draws nothing. Useful when only the event stream matters.
#[derive(Debug, Default)]
pub struct NullSurface;

impl DisplaySurface for NullSurface {
    fn render(&mut self, _slide: Option<&Slide>) {}
}
