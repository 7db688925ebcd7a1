//! Draft/sync reconciliation for per-field editing.
//!
//! Tracks, per `(entity, field)`, the last value the server confirmed and
//! the value being edited, and coordinates saves so that no two uploads
//! for the same key ever overlap.

use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::error::Result;

/// Identifies one editable field of one entity, e.g. one care category
/// of one breed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub entity_id: String,
    pub field_id: String,
}

impl FieldKey {
    pub fn new(entity_id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            field_id: field_id.into(),
        }
    }
}

/// Save lifecycle of one field
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saved,
    Error(String),
}

/// Point-in-time view of one field's reconciliation state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldState {
    pub persisted: String,
    pub draft: String,
    pub saving: bool,
    pub status: SaveStatus,
}

impl FieldState {
    /// True when the draft has diverged from the saved value
    pub fn is_dirty(&self) -> bool {
        self.draft != self.persisted
    }
}

/// Emitted on every status transition of any key
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub key: FieldKey,
    pub status: SaveStatus,
}

/// Where reconciled values are persisted
#[async_trait]
pub trait SaveTarget: Send + Sync {
    async fn persist(&self, key: &FieldKey, value: &str) -> Result<()>;
}

#[derive(Default)]
struct Entry {
    persisted: String,
    draft: String,
    saving: bool,
    status: SaveStatus,
    /// A save arrived while one was in flight; run one more afterwards
    queued: bool,
    /// Revert requested mid-save; re-sync draft when the save resolves
    revert_pending: bool,
    /// Bumped on every status change; stale reset timers check it
    epoch: u64,
    /// Pending autosave for this key
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    target: Arc<dyn SaveTarget>,
    state: Mutex<HashMap<FieldKey, Entry>>,
    last_edited: std::sync::Mutex<Option<FieldKey>>,
    autosave_enabled: AtomicBool,
    editable: AtomicBool,
    autosave_delay: Duration,
    saved_reset: Duration,
    status_tx: broadcast::Sender<StatusEvent>,
}

/// Coordinates drafts, saves and statuses for a set of editable fields.
///
/// Saves are serialized per key: a save issued while one is in flight is
/// coalesced into a single follow-up that picks up the then-current
/// draft, so the newest edit still reaches the server but two uploads
/// never race. Different keys save independently.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    pub fn new(target: Arc<dyn SaveTarget>, autosave_delay: Duration, saved_reset: Duration) -> Self {
        let (status_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                target,
                state: Mutex::new(HashMap::new()),
                last_edited: std::sync::Mutex::new(None),
                autosave_enabled: AtomicBool::new(false),
                editable: AtomicBool::new(false),
                autosave_delay,
                saved_reset,
                status_tx,
            }),
        }
    }

    /// Seed one field with its fetched value; persisted and draft start
    /// equal. Replaces any previous state for the key.
    pub async fn load(&self, key: &FieldKey, persisted: &str) {
        let mut state = self.inner.state.lock().await;
        if let Some(old) = state.get_mut(key) {
            if let Some(timer) = old.timer.take() {
                timer.abort();
            }
        }
        state.insert(
            key.clone(),
            Entry {
                persisted: persisted.to_string(),
                draft: persisted.to_string(),
                ..Entry::default()
            },
        );
    }

    /// Forget every field; used when the browsing scope changes. Saves
    /// still in flight resolve against nothing.
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        for entry in state.values_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
        state.clear();
        *self.inner.last_edited.lock().unwrap() = None;
    }

    /// Update a field's draft and remember it as the most recently
    /// edited key. Touches nothing else.
    pub async fn set_draft(&self, key: &FieldKey, value: &str) {
        let mut state = self.inner.state.lock().await;
        let entry = state.entry(key.clone()).or_default();
        entry.draft = value.to_string();
        drop(state);
        *self.inner.last_edited.lock().unwrap() = Some(key.clone());
    }

    /// Allow or forbid autosave scheduling
    pub fn set_autosave_enabled(&self, enabled: bool) {
        self.inner.autosave_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the current session may edit at all; gates autosave and
    /// the save-everything shortcut
    pub fn set_editable(&self, editable: bool) {
        self.inner.editable.store(editable, Ordering::SeqCst);
    }

    /// Arm (or re-arm) the debounced autosave for one key. Only that
    /// key's pending timer is replaced; a save that already fired is
    /// never cancelled. Does nothing unless autosave is on and the
    /// session can edit.
    pub async fn schedule_autosave(&self, key: &FieldKey) {
        if !self.inner.autosave_enabled.load(Ordering::SeqCst)
            || !self.inner.editable.load(Ordering::SeqCst)
        {
            return;
        }
        let mut state = self.inner.state.lock().await;
        let entry = state.entry(key.clone()).or_default();
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        let this = self.clone();
        let key = key.clone();
        let delay = self.inner.autosave_delay;
        // The stored handle covers only the debounce wait; once that
        // elapses the save runs as its own task, out of abort's reach.
        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(async move {
                this.save(&key).await;
            });
        }));
    }

    /// Save the key the user edited last; the save-everything shortcut.
    /// No-ops without edit privilege or a remembered key.
    pub async fn save_most_recently_edited(&self) {
        if !self.inner.editable.load(Ordering::SeqCst) {
            return;
        }
        let key = self.inner.last_edited.lock().unwrap().clone();
        if let Some(key) = key {
            self.save(&key).await;
        }
    }

    /// Persist one field's draft, trimmed, as captured at this call.
    ///
    /// No-ops when the entity id is empty (nothing to attach the row
    /// to). If a save for the key is already in flight the call queues a
    /// single follow-up instead of racing it. Gateway failures surface
    /// as an `Error` status, never as a panic or a return value.
    pub async fn save(&self, key: &FieldKey) {
        if key.entity_id.is_empty() {
            debug!("save skipped, no entity id for field {}", key.field_id);
            return;
        }

        loop {
            let value = {
                let mut state = self.inner.state.lock().await;
                let entry = state.entry(key.clone()).or_default();
                if entry.saving {
                    entry.queued = true;
                    debug!("save in flight for {:?}, queueing", key);
                    return;
                }
                entry.saving = true;
                self.set_status(entry, key, SaveStatus::Idle);
                entry.draft.trim().to_string()
            };

            let result = self.inner.target.persist(key, &value).await;

            let run_again = {
                let mut state = self.inner.state.lock().await;
                let entry = match state.get_mut(key) {
                    Some(entry) => entry,
                    // Scope changed while the save was in flight
                    None => return,
                };
                entry.saving = false;

                match result {
                    Ok(()) => {
                        entry.persisted = value.clone();
                        if entry.revert_pending {
                            entry.draft = entry.persisted.clone();
                            entry.revert_pending = false;
                        }
                        self.set_status(entry, key, SaveStatus::Saved);
                        self.arm_saved_reset(key, entry.epoch);
                    }
                    Err(e) => {
                        if entry.revert_pending {
                            entry.draft = entry.persisted.clone();
                            entry.revert_pending = false;
                        }
                        self.set_status(entry, key, SaveStatus::Error(e.to_string()));
                    }
                }

                let queued = entry.queued;
                entry.queued = false;
                queued
            };

            if !run_again {
                return;
            }
            // A queued save runs with the draft as it is now
        }
    }

    /// Throw away local edits: draft returns to the persisted value and
    /// the status clears. Mid-save, the revert is remembered and applied
    /// when the in-flight save resolves; the save itself is not
    /// cancelled and any queued follow-up is dropped.
    pub async fn revert(&self, key: &FieldKey) {
        let mut state = self.inner.state.lock().await;
        let entry = match state.get_mut(key) {
            Some(entry) => entry,
            None => return,
        };
        if entry.saving {
            entry.revert_pending = true;
            entry.queued = false;
            return;
        }
        entry.draft = entry.persisted.clone();
        entry.revert_pending = false;
        self.set_status(entry, key, SaveStatus::Idle);
    }

    /// Current state of one field; unknown keys read as pristine empty
    pub async fn snapshot(&self, key: &FieldKey) -> FieldState {
        let state = self.inner.state.lock().await;
        match state.get(key) {
            Some(entry) => FieldState {
                persisted: entry.persisted.clone(),
                draft: entry.draft.clone(),
                saving: entry.saving,
                status: entry.status.clone(),
            },
            None => FieldState::default(),
        }
    }

    /// Observe status transitions across all keys
    pub fn on_status_change(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.status_tx.subscribe()
    }

    fn set_status(&self, entry: &mut Entry, key: &FieldKey, status: SaveStatus) {
        entry.epoch += 1;
        entry.status = status.clone();
        let _ = self.inner.status_tx.send(StatusEvent {
            key: key.clone(),
            status,
        });
    }

    /// After the lingering period, put a still-"saved" field back to
    /// idle. The epoch guard keeps a stale timer from clobbering a
    /// newer status.
    fn arm_saved_reset(&self, key: &FieldKey, epoch: u64) {
        let this = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.saved_reset).await;
            let mut state = this.inner.state.lock().await;
            if let Some(entry) = state.get_mut(&key) {
                if entry.epoch == epoch && entry.status == SaveStatus::Saved {
                    this.set_status(entry, &key, SaveStatus::Idle);
                }
            }
        });
    }
}
