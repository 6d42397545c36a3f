//! Persistence slot: one named JSON file holding the current notification set.
//!
//! Any number of processes (execution contexts) may share the file. There is
//! no transaction: last writer wins. Readers treat anything unparseable as an
//! empty set.
//!
//! Change signals:
//! - writes made through this `SlotStore` broadcast [`ChangeOrigin::Local`]
//!   immediately;
//! - [`SlotStore::watch`] follows the slot's directory with a `notify`
//!   watcher and broadcasts [`ChangeOrigin::External`] when another context
//!   replaced the file. A SHA-256 fingerprint of the last content this
//!   context wrote or saw filters out our own writes and repeated events.

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::Config;
use crate::error::SlotError;
use crate::notification::{collect_lenient, Notification, NotificationSet};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Who rewrote the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// This context wrote it.
    Local,
    /// Another context wrote it.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotChange {
    pub origin: ChangeOrigin,
}

/// Store adapter over the slot file. Cheap to clone; clones share the
/// fingerprint and the change channel.
#[derive(Clone)]
pub struct SlotStore {
    path: PathBuf,
    /// SHA-256 of the content this context last wrote or observed.
    /// `None` while the file is absent.
    fingerprint: Arc<Mutex<Option<String>>>,
    changes: broadcast::Sender<SlotChange>,
}

impl SlotStore {
    /// Open the slot at `path`. The file does not need to exist.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let fingerprint = fingerprint_of(&path).unwrap_or(None);
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            fingerprint: Arc::new(Mutex::new(fingerprint)),
            changes,
        }
    }

    /// Open the slot named by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, SlotError> {
        Ok(Self::open(config.slot_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the slot file.
    fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Decode the slot. A missing file is an empty set; content that is not
    /// a JSON array is `MalformedPersistedData`.
    pub fn try_read_all(&self) -> Result<NotificationSet, SlotError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let malformed = |message: String| SlotError::MalformedPersistedData {
            path: self.path.clone(),
            message,
        };
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        match value {
            serde_json::Value::Array(items) => Ok(collect_lenient(items)),
            other => Err(malformed(format!("expected an array, found {}", json_type(&other)))),
        }
    }

    /// Like [`try_read_all`](Self::try_read_all), but every failure reads as empty.
    pub fn read_all(&self) -> NotificationSet {
        self.try_read_all().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "slot unreadable, treating as empty");
            Vec::new()
        })
    }

    /// [`read_all`](Self::read_all) on the blocking pool, for async callers.
    pub async fn load(&self) -> NotificationSet {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read_all())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "slot read task failed, treating as empty");
                Vec::new()
            })
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Replace the slot content atomically and broadcast a local change.
    ///
    /// Content goes to a uniquely named temp file in the slot's directory
    /// first, so concurrent writers never share a partial file.
    pub fn write_all(&self, notifications: &[Notification]) -> Result<(), SlotError> {
        let content = serde_json::to_string_pretty(notifications)?;
        {
            let mut fingerprint = self.lock_fingerprint();
            let dir = self.dir();
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(content.as_bytes())?;
            tmp.persist(&self.path).map_err(|e| e.error)?;
            *fingerprint = Some(digest(content.as_bytes()));
        }
        tracing::debug!(path = %self.path.display(), count = notifications.len(), "slot written");
        self.emit_local_change();
        Ok(())
    }

    /// Insert or replace by identity. Returns `true` if an entry was replaced.
    pub fn upsert(&self, notification: Notification) -> Result<bool, SlotError> {
        let mut all = self.read_all();
        let existing = notification
            .identity()
            .and_then(|id| all.iter().position(|n| n.identity() == Some(id)));
        let replaced = match existing {
            Some(pos) => {
                all[pos] = notification;
                true
            }
            None => {
                all.push(notification);
                false
            }
        };
        self.write_all(&all)?;
        Ok(replaced)
    }

    /// Remove by identity. Returns `false` (and writes nothing) if absent.
    pub fn remove(&self, id: &str) -> Result<bool, SlotError> {
        let mut all = self.read_all();
        let before = all.len();
        all.retain(|n| n.identity() != Some(id));
        if all.len() == before {
            return Ok(false);
        }
        self.write_all(&all)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), SlotError> {
        self.write_all(&[])
    }

    // ── Change signals ───────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SlotChange> {
        self.changes.subscribe()
    }

    /// Tell same-context listeners the slot changed. The watcher only
    /// reports writes from other contexts.
    pub fn emit_local_change(&self) {
        let _ = self.changes.send(SlotChange {
            origin: ChangeOrigin::Local,
        });
    }

    /// Compare the file with what this context last wrote or saw. Returns
    /// `true` and broadcasts `External` if it differs. Blocking.
    pub fn check_external(&self) -> bool {
        let changed = {
            let mut known = self.lock_fingerprint();
            match fingerprint_of(&self.path) {
                Ok(current) if current != *known => {
                    *known = current;
                    true
                }
                Ok(_) => false,
                Err(e) => {
                    tracing::debug!(path = %self.path.display(), error = %e, "slot fingerprint failed");
                    false
                }
            }
        };
        if changed {
            tracing::debug!(path = %self.path.display(), "slot changed by another context");
            let _ = self.changes.send(SlotChange {
                origin: ChangeOrigin::External,
            });
        }
        changed
    }

    /// Follow the slot for external changes until `shutdown` is cancelled.
    ///
    /// The directory is watched rather than the file, since an atomic
    /// replace swaps the file underneath a file watch.
    pub async fn watch(self, shutdown: CancellationToken) {
        let (tx, mut events) = mpsc::unbounded_channel();
        let store = self.clone();
        let watcher = tokio::task::spawn_blocking(move || store.start_watcher(tx)).await;
        let _watcher = match watcher {
            Ok(Ok(watcher)) => watcher,
            Ok(Err(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "slot watcher unavailable");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "slot watcher setup task failed");
                return;
            }
        };

        // Catch writes that landed before the watch was registered.
        self.check_external_off_thread().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(Ok(event)) if self.concerns_slot(&event) => {
                        self.check_external_off_thread().await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(path = %self.path.display(), error = %e, "slot watcher error");
                    }
                    None => break,
                },
            }
        }
        tracing::debug!(path = %self.path.display(), "slot watcher stopped");
    }

    fn start_watcher(
        &self,
        tx: mpsc::UnboundedSender<notify::Result<notify::Event>>,
    ) -> Result<RecommendedWatcher, SlotError> {
        let dir = self.dir();
        std::fs::create_dir_all(&dir)?;
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let _ = tx.send(event);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    /// Reads never change the file; events without paths may mean anything.
    fn concerns_slot(&self, event: &notify::Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        event.paths.is_empty()
            || event
                .paths
                .iter()
                .any(|p| p.file_name() == self.path.file_name())
    }

    async fn check_external_off_thread(&self) -> bool {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.check_external())
            .await
            .unwrap_or(false)
    }

    fn lock_fingerprint(&self) -> MutexGuard<'_, Option<String>> {
        self.fingerprint.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn fingerprint_of(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(digest(&bytes))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SlotStore {
        SlotStore::open(dir.path().join("notifications.json"))
    }

    fn ids(set: &[Notification]) -> Vec<&str> {
        set.iter().filter_map(Notification::identity).collect()
    }

    #[test]
    fn missing_slot_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.try_read_all().unwrap().is_empty());
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn malformed_slot_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(
            store.try_read_all(),
            Err(SlotError::MalformedPersistedData { .. })
        ));
        assert!(store.read_all().is_empty());

        std::fs::write(store.path(), r#"{"id": "n1"}"#).unwrap();
        let err = store.try_read_all().unwrap_err();
        assert!(err.to_string().contains("expected an array"));
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let set = vec![
            Notification::new("Vocabulary", "Ten new words").with_id("n1"),
            Notification::new("Grammar", "Past perfect").with_id("n2"),
        ];
        store.write_all(&set).unwrap();
        assert_eq!(ids(&store.read_all()), vec!["n1", "n2"]);
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("notifications.json")]);
    }

    #[test]
    fn concurrent_writers_never_collide() {
        let dir = TempDir::new().unwrap();
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = store_in(&dir);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let n = Notification::new(format!("w{w}"), format!("#{i}"))
                            .with_id(format!("w{w}-{i}"));
                        store.write_all(&[n]).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let store = store_in(&dir);
        let all = store.try_read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].identity().is_some_and(|id| id.ends_with("-99")));
    }

    #[test]
    fn write_emits_local_change() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut rx = store.subscribe();

        store.write_all(&[Notification::new("a", "b")]).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            SlotChange {
                origin: ChangeOrigin::Local
            }
        );
    }

    #[test]
    fn own_writes_are_not_reported_as_external() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write_all(&[Notification::new("a", "b")]).unwrap();
        assert!(!store.check_external());
    }

    #[test]
    fn other_context_write_is_detected_once() {
        let dir = TempDir::new().unwrap();
        let tab_a = store_in(&dir);
        let tab_b = store_in(&dir);
        let mut rx = tab_b.subscribe();

        tab_a
            .write_all(&[Notification::new("Story", "Chapter 2").with_id("n9")])
            .unwrap();

        assert!(tab_b.check_external());
        assert_eq!(rx.try_recv().unwrap().origin, ChangeOrigin::External);
        assert!(!tab_b.check_external());
        assert_eq!(ids(&tab_b.read_all()), vec!["n9"]);
    }

    #[test]
    fn deleting_the_file_counts_as_a_change() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write_all(&[Notification::new("a", "b")]).unwrap();
        std::fs::remove_file(store.path()).unwrap();
        assert!(store.check_external());
    }

    #[test]
    fn upsert_replaces_by_identity() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.upsert(Notification::new("v1", "").with_id("n1")).unwrap());
        assert!(!store.upsert(Notification::new("other", "").with_id("n2")).unwrap());
        assert!(store.upsert(Notification::new("v2", "").with_id("n1")).unwrap());

        let all = store.read_all();
        assert_eq!(ids(&all), vec!["n1", "n2"]);
        assert_eq!(all[0].title, "v2");
    }

    #[test]
    fn remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.upsert(Notification::new("a", "").with_id("n1")).unwrap();
        store.upsert(Notification::new("b", "").with_id("n2")).unwrap();

        assert!(store.remove("n1").unwrap());
        assert!(!store.remove("n1").unwrap());
        assert_eq!(ids(&store.read_all()), vec!["n2"]);

        store.clear().unwrap();
        assert!(store.read_all().is_empty());
    }

    #[tokio::test]
    async fn load_reads_off_thread() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write_all(&[Notification::new("a", "").with_id("n1")]).unwrap();
        assert_eq!(ids(&store.load().await), vec!["n1"]);

        std::fs::write(store.path(), "[[[").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[test]
    fn only_events_on_the_slot_file_count() {
        use notify::event::{AccessKind, CreateKind, ModifyKind};

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let event = |kind, name: &str| notify::Event::new(kind).add_path(dir.path().join(name));

        assert!(store.concerns_slot(&event(EventKind::Modify(ModifyKind::Any), "notifications.json")));
        assert!(store.concerns_slot(&event(EventKind::Create(CreateKind::File), "notifications.json")));
        assert!(!store.concerns_slot(&event(EventKind::Modify(ModifyKind::Any), "config.toml")));
        assert!(!store.concerns_slot(&event(EventKind::Access(AccessKind::Any), "notifications.json")));
        assert!(store.concerns_slot(&notify::Event::new(EventKind::Any)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watcher_reports_external_writes_and_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let writer = store_in(&dir);
        let watched = store_in(&dir);
        let mut rx = watched.subscribe();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(watched.clone().watch(shutdown.clone()));
        // Let the watcher register before writing.
        tokio::time::sleep(Duration::from_millis(200)).await;

        writer.write_all(&[Notification::new("x", "y")]).unwrap();
        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.origin, ChangeOrigin::External);
        assert_eq!(watched.read_all()[0].title, "x");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watcher_ignores_own_writes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut rx = store.subscribe();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(store.clone().watch(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        store.write_all(&[Notification::new("mine", "")]).unwrap();
        assert_eq!(rx.recv().await.unwrap().origin, ChangeOrigin::Local);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        shutdown.cancel();
        task.await.unwrap();
    }
}
