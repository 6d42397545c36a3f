//! Reminder service.
//!
//! One task (the actor) owns the [`DedupEngine`], the [`Presenter`] and the
//! display surface. Everything else runs as a separate task and only posts
//! commands into the actor's inbox:
//!
//! - snapshot poller: every `poll_interval`, or when woken by a deep check
//!   or an explicit refresh; on failure it falls back to the slot;
//! - long poll: re-issued after every answer with a `long_poll_backoff`
//!   pause; a `true` answer triggers a snapshot;
//! - deep check: every `deep_check_interval`, clears shown marks;
//! - slot watcher + listener: external and local slot changes re-read the
//!   slot off the async threads;
//! - dismiss / navigation timers, armed by the actor itself.
//!
//! The actor handles one command at a time, so arbitrary interleaving of the
//! above cannot corrupt the seen set or the presenter. Every task stops when
//! the handle's [`CancellationToken`] is cancelled, on
//! [`ReminderHandle::shutdown`] or when the handle is dropped.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::{DedupEngine, Presenter, Selection};
use crate::events::{Event, SourceKind};
use crate::notification::{Notification, NotificationSet};
use crate::source::NotificationSource;
use crate::storage::{ServiceTiming, SlotStore};
use crate::surface::DisplaySurface;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// User intents coming from the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Close,
    Next,
    Previous,
}

#[derive(Debug)]
enum Command {
    Candidates {
        set: NotificationSet,
        source: SourceKind,
    },
    SourceFailed {
        source: SourceKind,
        message: String,
    },
    Intent(Intent),
    DismissElapsed(u64),
    TransitionElapsed(u64),
    DeepCheck,
    Refresh,
}

/// Configured but not yet running service.
pub struct ReminderService<S, D> {
    source: Arc<S>,
    slot: SlotStore,
    surface: D,
    timing: ServiceTiming,
    events: broadcast::Sender<Event>,
}

impl<S, D> ReminderService<S, D>
where
    S: NotificationSource,
    D: DisplaySurface,
{
    pub fn new(source: S, slot: SlotStore, surface: D, timing: ServiceTiming) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source: Arc::new(source),
            slot,
            surface,
            timing,
            events,
        }
    }

    /// Subscribe before [`spawn`](Self::spawn) to see the very first events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Start the actor and its feeder tasks. Must be called inside a tokio
    /// runtime.
    pub fn spawn(self) -> ReminderHandle {
        let (commands, inbox) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let timing = self.timing;

        // Subscribe now so no change between spawn and first poll is lost.
        let slot_changes = self.slot.subscribe();

        let actor = Actor {
            engine: DedupEngine::new(),
            presenter: Presenter::new(timing.default_display),
            surface: self.surface,
            events: self.events.clone(),
            commands: commands.clone(),
            timer: None,
            on_screen: None,
            refresh: refresh.clone(),
            transition: timing.transition,
        };

        let mut tasks = vec![tokio::spawn(actor.run(inbox, shutdown.clone()))];

        tasks.push(tokio::spawn(poll_snapshots(
            self.source.clone(),
            self.slot.clone(),
            commands.clone(),
            timing.poll_interval,
            refresh,
            shutdown.clone(),
        )));

        if self.source.is_remote() {
            tasks.push(tokio::spawn(long_poll(
                self.source.clone(),
                self.slot.clone(),
                commands.clone(),
                timing.long_poll_backoff,
                shutdown.clone(),
            )));
        }

        tasks.push(tokio::spawn(deep_checks(
            commands.clone(),
            timing.deep_check_interval,
            shutdown.clone(),
        )));

        tasks.push(tokio::spawn(self.slot.clone().watch(shutdown.clone())));

        tasks.push(tokio::spawn(follow_slot(
            self.slot,
            slot_changes,
            commands.clone(),
            shutdown.clone(),
        )));

        tracing::info!("reminder service started");
        ReminderHandle {
            commands,
            events: self.events,
            shutdown,
            tasks,
        }
    }
}

/// Running service.
pub struct ReminderHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<Event>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ReminderHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn intent(&self, intent: Intent) -> bool {
        self.send(Command::Intent(intent))
    }

    pub fn close(&self) -> bool {
        self.intent(Intent::Close)
    }

    pub fn next(&self) -> bool {
        self.intent(Intent::Next)
    }

    pub fn previous(&self) -> bool {
        self.intent(Intent::Previous)
    }

    /// Fetch a snapshot now instead of waiting for the next tick.
    pub fn refresh(&self) -> bool {
        self.send(Command::Refresh)
    }

    /// Clear shown marks and refetch, as the periodic deep check does.
    pub fn deep_check(&self) -> bool {
        self.send(Command::DeepCheck)
    }

    /// Feed a candidate set directly.
    pub fn ingest(&self, set: NotificationSet, source: SourceKind) -> bool {
        self.send(Command::Candidates { set, source })
    }

    /// Stop every task (in-flight long polls included), detach the slot
    /// listener and wait for the actor to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "reminder task ended abnormally");
            }
        }
        tracing::info!("reminder service stopped");
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ── Actor ────────────────────────────────────────────────────────────

struct Actor<D> {
    engine: DedupEngine,
    presenter: Presenter,
    surface: D,
    events: broadcast::Sender<Event>,
    /// Used by timers to post back into the inbox.
    commands: mpsc::UnboundedSender<Command>,
    /// The single pending dismiss or navigation timer.
    timer: Option<JoinHandle<()>>,
    /// What the last `NotificationShown` put on the surface.
    on_screen: Option<Notification>,
    refresh: Arc<Notify>,
    transition: Duration,
}

impl<D: DisplaySurface> Actor<D> {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                command = inbox.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        self.cancel_timer();
        if self.presenter.current().is_some() {
            self.surface.render(None);
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Candidates { set, source } => {
                let (selection, report) = self.engine.ingest(set, source, Utc::now());
                self.emit(Event::CandidatesIngested {
                    source: report.source,
                    candidates: report.candidates,
                    eligible: report.eligible,
                    queued: report.queued,
                    at: Utc::now(),
                });
                let event = match selection {
                    Selection::Present(queue) => self.presenter.present(queue),
                    Selection::Clear => self.presenter.clear(),
                    Selection::Unchanged => None,
                };
                self.apply(event);
            }
            Command::SourceFailed { source, message } => {
                self.emit(Event::SourceFailed {
                    source,
                    message,
                    at: Utc::now(),
                });
            }
            Command::Intent(intent) => {
                let event = match intent {
                    Intent::Close => self.presenter.close(),
                    Intent::Next => self.presenter.next(),
                    Intent::Previous => self.presenter.previous(),
                };
                self.apply(event);
            }
            Command::DismissElapsed(generation) => {
                let event = self.presenter.dismiss_elapsed(generation);
                self.apply(event);
            }
            Command::TransitionElapsed(generation) => {
                let event = self.presenter.transition_elapsed(generation);
                self.apply(event);
            }
            Command::DeepCheck => {
                let cleared = self.engine.reset_seen();
                tracing::info!(cleared, "deep check: shown marks reset");
                self.emit(Event::SeenReset {
                    cleared,
                    at: Utc::now(),
                });
                self.refresh.notify_one();
            }
            Command::Refresh => self.refresh.notify_one(),
        }
    }

    /// Carry out the side effects of a presenter transition, then publish it.
    fn apply(&mut self, event: Option<Event>) {
        let Some(event) = event else {
            return;
        };
        match &event {
            Event::NotificationShown {
                notification,
                display_ms,
                ..
            } => {
                tracing::info!(id = ?notification.id, title = %notification.title, "notification shown");
                let generation = self.presenter.generation();
                self.arm(
                    Duration::from_millis(*display_ms),
                    Command::DismissElapsed(generation),
                );
                self.on_screen = Some(notification.clone());
                self.surface.render(self.presenter.slide().as_ref());
            }
            Event::NavigationStarted { to_index, .. } => {
                tracing::debug!(to_index, "navigating");
                self.on_screen = None;
                let generation = self.presenter.generation();
                self.arm(self.transition, Command::TransitionElapsed(generation));
                self.surface.render(None);
            }
            Event::NotificationDismissed { reason, .. } => {
                self.cancel_timer();
                self.surface.render(None);
                if let Some(dismissed) = self.on_screen.take() {
                    match dismissed.require_identity() {
                        Ok(id) => {
                            self.engine.mark_shown(id);
                            tracing::info!(%id, ?reason, "notification dismissed");
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, ?reason, "dismissed without marking; it will be offered again");
                        }
                    }
                }
            }
            Event::NotificationHidden { .. } => {
                self.on_screen = None;
                self.cancel_timer();
                self.surface.render(None);
            }
            _ => {}
        }
        self.emit(event);
    }

    fn arm(&mut self, after: Duration, command: Command) {
        self.cancel_timer();
        let commands = self.commands.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = commands.send(command);
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// ── Feeder tasks ─────────────────────────────────────────────────────

/// Fetch a snapshot and post it; on failure post the slot content instead.
async fn deliver_snapshot<S: NotificationSource>(
    source: &S,
    slot: &SlotStore,
    kind: SourceKind,
    commands: &mpsc::UnboundedSender<Command>,
) {
    if !source.is_remote() {
        let _ = commands.send(Command::Candidates {
            set: slot.load().await,
            source: SourceKind::Slot,
        });
        return;
    }

    match source.fetch_snapshot(Utc::now()).await {
        Ok(set) => {
            let _ = commands.send(Command::Candidates { set, source: kind });
        }
        Err(e) => {
            tracing::warn!(error = %e, source = ?kind, "snapshot failed, falling back to slot");
            let _ = commands.send(Command::SourceFailed {
                source: kind,
                message: e.to_string(),
            });
            let _ = commands.send(Command::Candidates {
                set: slot.load().await,
                source: SourceKind::Slot,
            });
        }
    }
}

async fn poll_snapshots<S: NotificationSource>(
    source: Arc<S>,
    slot: SlotStore,
    commands: mpsc::UnboundedSender<Command>,
    period: Duration,
    refresh: Arc<Notify>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = refresh.notified() => ticker.reset(),
            _ = shutdown.cancelled() => break,
        }
        tokio::select! {
            _ = deliver_snapshot(&*source, &slot, SourceKind::Snapshot, &commands) => {}
            _ = shutdown.cancelled() => break,
        }
    }
    tracing::debug!("snapshot poller stopped");
}

async fn long_poll<S: NotificationSource>(
    source: Arc<S>,
    slot: SlotStore,
    commands: mpsc::UnboundedSender<Command>,
    backoff: Duration,
    shutdown: CancellationToken,
) {
    let mut since = Utc::now();
    loop {
        let outcome = tokio::select! {
            outcome = source.poll_for_change(since) => outcome,
            _ = shutdown.cancelled() => break,
        };
        match outcome {
            Ok(true) => {
                since = Utc::now();
                tokio::select! {
                    _ = deliver_snapshot(&*source, &slot, SourceKind::LongPoll, &commands) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(error = %e, "long poll failed");
                let _ = commands.send(Command::SourceFailed {
                    source: SourceKind::LongPoll,
                    message: e.to_string(),
                });
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown.cancelled() => break,
        }
    }
    tracing::debug!("long poll stopped");
}

async fn deep_checks(
    commands: mpsc::UnboundedSender<Command>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _ = commands.send(Command::DeepCheck);
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

/// Re-read the slot whenever it changes, locally or from another context.
async fn follow_slot(
    slot: SlotStore,
    mut changes: broadcast::Receiver<crate::storage::SlotChange>,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => {
                    tracing::debug!(origin = ?change.origin, "slot changed");
                }
                // Missed some signals; one re-read covers them all.
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.cancelled() => break,
        }
        let _ = commands.send(Command::Candidates {
            set: slot.load().await,
            source: SourceKind::Slot,
        });
    }
}
