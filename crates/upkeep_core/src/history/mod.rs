//! Whole-store undo/redo.
//!
//! # Responsibility
//! - Keep the bounded snapshot log in `app_history`.
//! - Restore the wrapped store when moving through history.
//!
//! # Invariants
//! - Snapshots are owned copies; later store edits never reach history.
//! - A failed persist leaves both the log and the store as they were.
//! - Debouncing is the caller's job (see [`SaveThrottle`]).

mod log;
mod throttle;

pub use self::log::{DescriptionRequired, HistoryEntry, HistoryLog, SaveOutcome};
pub use throttle::{SaveThrottle, DEFAULT_MIN_GAP, DEFAULT_QUIET_WINDOW};

use crate::model::snapshot::StoreSnapshot;
use crate::storage::{CollectionKey, CollectionStorage, StorageError};
use crate::store::{EntityStore, StoreError};
use crate::transfer::{import_data, DataScope, ImportEnvelope, ImportReport, TransferError};
use ::log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// History operation errors.
#[derive(Debug)]
pub enum HistoryError {
    EmptyDescription,
    /// Writing the log failed; the in-memory log was rolled back.
    Persist(StorageError),
    /// Restoring the store failed; the log index was rolled back.
    Store(StoreError),
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "history description must not be blank"),
            Self::Persist(err) => write!(f, "failed to persist history: {err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyDescription => None,
            Self::Persist(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<DescriptionRequired> for HistoryError {
    fn from(_: DescriptionRequired) -> Self {
        Self::EmptyDescription
    }
}

/// Owns an [`EntityStore`] and its undo/redo log.
pub struct HistoryManager<S: CollectionStorage> {
    store: EntityStore<S>,
    log: HistoryLog,
}

impl<S: CollectionStorage> HistoryManager<S> {
    /// Wraps `store`, loading the persisted log.
    ///
    /// A corrupt or unreadable log is dropped and history starts empty.
    pub fn open(mut store: EntityStore<S>) -> Self {
        let capacity = store.config().history_capacity;
        let max_chars = store.config().history_description_max_chars;

        let log = match store.read_raw(CollectionKey::AppHistory) {
            Ok(Some(raw)) => match HistoryLog::from_json(&raw, capacity, max_chars) {
                Ok(log) => log,
                Err(err) => {
                    warn!("event=history_load module=history status=recovered error={err}");
                    if let Err(err) = store.remove_raw(CollectionKey::AppHistory) {
                        warn!("event=history_load module=history status=error error={err}");
                    }
                    HistoryLog::new(capacity, max_chars)
                }
            },
            Ok(None) => HistoryLog::new(capacity, max_chars),
            Err(err) => {
                warn!("event=history_load module=history status=error error={err}");
                HistoryLog::new(capacity, max_chars)
            }
        };

        info!(
            "event=history_load module=history status=ok entries={} current_index={:?}",
            log.len(),
            log.current_index()
        );
        Self { store, log }
    }

    pub fn store(&self) -> &EntityStore<S> {
        &self.store
    }

    /// Mutable store access. Edits are not recorded until the caller saves.
    pub fn store_mut(&mut self) -> &mut EntityStore<S> {
        &mut self.store
    }

    pub fn into_store(self) -> EntityStore<S> {
        self.store
    }

    pub fn log(&self) -> &HistoryLog {
        &self.log
    }

    /// Records an explicit snapshot.
    ///
    /// Equality with the current entry is decided structurally.
    pub fn save_state(
        &mut self,
        snapshot: StoreSnapshot,
        description: &str,
    ) -> Result<SaveOutcome, HistoryError> {
        self.record(snapshot, None, description)
    }

    /// Records the live store state.
    ///
    /// Unchanged store revisions short-circuit without a deep comparison.
    pub fn checkpoint(&mut self, description: &str) -> Result<SaveOutcome, HistoryError> {
        let revision = self.store.revision();
        self.record(self.store.snapshot(), Some(revision), description)
    }

    fn record(
        &mut self,
        snapshot: StoreSnapshot,
        revision: Option<crate::model::snapshot::StoreRevision>,
        description: &str,
    ) -> Result<SaveOutcome, HistoryError> {
        let before = self.log.clone();
        let now = self.store.clock().now();
        let outcome = self.log.save_state(snapshot, revision, description, now)?;

        if let SaveOutcome::Saved { entry_id } = &outcome {
            if let Err(err) = self.persist_log() {
                self.log = before;
                error!("event=history_save module=history status=error error={err}");
                return Err(HistoryError::Persist(err));
            }
            info!(
                "event=history_save module=history status=ok entry_id={entry_id} entries={}",
                self.log.len()
            );
        }
        Ok(outcome)
    }

    /// Moves one step back and restores the store to that entry.
    ///
    /// Returns `None` (and changes nothing) at the oldest entry.
    pub fn undo(&mut self) -> Result<Option<HistoryEntry>, HistoryError> {
        let Some(entry) = self.log.undo().cloned() else {
            return Ok(None);
        };
        self.apply_step("undo", entry, HistoryLog::redo)
    }

    /// Moves one step forward and restores the store to that entry.
    pub fn redo(&mut self) -> Result<Option<HistoryEntry>, HistoryError> {
        let Some(entry) = self.log.redo().cloned() else {
            return Ok(None);
        };
        self.apply_step("redo", entry, HistoryLog::undo)
    }

    fn apply_step(
        &mut self,
        direction: &'static str,
        entry: HistoryEntry,
        revert: fn(&mut HistoryLog) -> Option<&HistoryEntry>,
    ) -> Result<Option<HistoryEntry>, HistoryError> {
        if let Err(err) = self.persist_log() {
            revert(&mut self.log);
            error!("event=history_{direction} module=history status=error error={err}");
            return Err(HistoryError::Persist(err));
        }

        if let Err(err) = self.store.restore_snapshot(entry.snapshot.clone()) {
            revert(&mut self.log);
            if let Err(persist_err) = self.persist_log() {
                warn!(
                    "event=history_{direction} module=history status=error stage=revert error={persist_err}"
                );
            }
            return Err(HistoryError::Store(err));
        }

        info!(
            "event=history_{direction} module=history status=ok entry_id={} current_index={:?}",
            entry.id,
            self.log.current_index()
        );
        Ok(Some(entry))
    }

    /// Drops every entry and the persisted log.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.store
            .remove_raw(CollectionKey::AppHistory)
            .map_err(HistoryError::Persist)?;
        self.log.clear();
        Ok(())
    }

    /// Imports into the wrapped store. A full import also wipes history,
    /// since its persisted log was cleared with everything else.
    pub fn import(
        &mut self,
        envelope: ImportEnvelope,
        scopes: &[DataScope],
    ) -> Result<ImportReport, TransferError> {
        let report = import_data(&mut self.store, envelope, scopes)?;
        if report.full {
            self.log.clear();
        }
        Ok(report)
    }

    fn persist_log(&mut self) -> Result<(), StorageError> {
        let payload = self
            .log
            .to_json()
            .map_err(|source| StorageError::Serialize {
                key: CollectionKey::AppHistory,
                source,
            })?;
        self.store.write_raw(CollectionKey::AppHistory, payload)
    }
}
