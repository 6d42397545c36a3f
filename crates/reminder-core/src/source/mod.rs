//! Remote notification sources.
//!
//! The service only depends on [`NotificationSource`]. [`HttpSource`] talks to
//! the real API; [`OfflineSource`] stands in when remote fetching is off and
//! the slot is the only input.

mod http;

pub use http::HttpSource;

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::error::SourceError;
use crate::notification::NotificationSet;

/// Every remote notification source implements this trait.
///
/// Failures are returned, never panicked; the caller decides the fallback.
pub trait NotificationSource: Send + Sync + 'static {
    /// Full current notification list. `since` tags the request for tracing
    /// on the server side.
    fn fetch_snapshot(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<NotificationSet, SourceError>> + Send;

    /// Long-lived "has new data" check. The server may hold it open until
    /// something changes or its own timeout elapses.
    fn poll_for_change(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, SourceError>> + Send;

    /// Whether there is a remote at all. When `false` the service reads the
    /// slot on every poll tick and runs no long poll.
    fn is_remote(&self) -> bool {
        true
    }
}

/// Source with no remote behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSource;

impl NotificationSource for OfflineSource {
    async fn fetch_snapshot(&self, _since: DateTime<Utc>) -> Result<NotificationSet, SourceError> {
        Err(SourceError::Disabled)
    }

    async fn poll_for_change(&self, _since: DateTime<Utc>) -> Result<bool, SourceError> {
        Err(SourceError::Disabled)
    }

    fn is_remote(&self) -> bool {
        false
    }
}
