//! # Reminder Core Library
//!
//! Notification delivery and deduplication. Notifications arrive from three
//! independent feeds (a periodic REST snapshot, a long-poll "has new data"
//! channel and a shared persistence slot) and leave as one sequential,
//! non-duplicated presentation. The CLI is a thin surface over this crate.
//!
//! ## Architecture
//!
//! - **Source**: [`NotificationSource`] seam with the reqwest-backed
//!   [`HttpSource`]
//! - **Storage**: [`SlotStore`] (JSON slot file with change signals) and
//!   TOML [`Config`]
//! - **Engine**: [`DedupEngine`] filters and remembers what was shown;
//!   [`Presenter`] is the display state machine
//! - **Service**: [`ReminderService`] runs the engine and presenter in one
//!   actor task and feeds it from the sources

pub mod engine;
pub mod error;
pub mod events;
pub mod notification;
pub mod service;
pub mod source;
pub mod storage;
pub mod surface;

pub use engine::{DedupEngine, IngestReport, Presenter, PresenterState, Selection};
pub use error::{ConfigError, CoreError, SlotError, SourceError};
pub use events::{DismissReason, Event, SourceKind};
pub use notification::{Notification, NotificationKind, NotificationSet, MAX_DISPLAY_SECS};
pub use service::{Intent, ReminderHandle, ReminderService};
pub use source::{HttpSource, NotificationSource, OfflineSource};
pub use storage::{ChangeOrigin, Config, ServiceTiming, SlotChange, SlotStore};
pub use surface::{DisplaySurface, NullSurface, Slide};
