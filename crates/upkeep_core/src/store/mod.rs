//! Authoritative in-memory collections with persisted mutations.
//!
//! # Responsibility
//! - Own every entity collection and mediate all mutations.
//! - Persist each mutation's affected collections in one atomic write.
//! - Roll memory back to the pre-mutation state when a write fails.
//!
//! # Invariants
//! - Memory and storage agree after every successful call.
//! - A failed call leaves memory exactly as it was before the call.
//! - Derived rows are only ever produced by `crate::derivation`.

mod contracts;
mod directory;

pub(crate) use contracts::admit_contracts;
pub(crate) use directory::active_assignments;

use crate::clock::Clock;
use crate::config::StoreConfig;
use crate::derivation::{audit, sync_kanban, ConsistencyReport, DerivationEngine};
use crate::loader::{load, LoadReport};
use crate::model::contract::ContractValidationError;
use crate::model::snapshot::{StoreRevision, StoreSnapshot};
use crate::storage::{
    CollectionKey, CollectionStorage, CollectionWrite, StorageError, StorageResult,
};
use chrono::NaiveDate;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity kinds named in store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Contract,
    Engineer,
    Object,
    Task,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Engineer => "engineer",
            Self::Object => "object",
            Self::Task => "task",
        }
    }
}

/// Errors raised by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// A non-archived contract already uses this number.
    DuplicateKey {
        contract_number: String,
        existing_id: String,
    },
    NotFound { entity: EntityKind, id: String },
    /// Engineer still assigned to active contracts.
    ReferentialConstraint {
        engineer_id: String,
        contract_ids: Vec<String>,
    },
    Validation(ContractValidationError),
    InvalidInput(String),
    /// Persisting failed; memory was rolled back before this was returned.
    StorageFailure {
        operation: &'static str,
        source: StorageError,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey {
                contract_number,
                existing_id,
            } => write!(
                f,
                "contract number `{contract_number}` is already used by contract {existing_id}"
            ),
            Self::NotFound { entity, id } => write!(f, "{} not found: {id}", entity.as_str()),
            Self::ReferentialConstraint {
                engineer_id,
                contract_ids,
            } => write!(
                f,
                "engineer {engineer_id} is assigned to active contracts: {}",
                contract_ids.join(", ")
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::StorageFailure { operation, source } => {
                write!(f, "storage failure during {operation}: {source}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StorageFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ContractValidationError> for StoreError {
    fn from(value: ContractValidationError) -> Self {
        Self::Validation(value)
    }
}

/// How a commit reaches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Overwrite only the listed keys.
    Keys,
    /// Clear every persisted key first, including history and notifications.
    ReplaceAll,
}

/// Collections touched by any contract mutation.
const CONTRACT_KEYS: [CollectionKey; 4] = [
    CollectionKey::Contracts,
    CollectionKey::Tasks,
    CollectionKey::Kanban,
    CollectionKey::ContractKanban,
];

/// Explicitly owned store handle; see [`EntityStore::open`] and
/// [`EntityStore::close`].
pub struct EntityStore<S: CollectionStorage> {
    storage: S,
    config: StoreConfig,
    clock: Box<dyn Clock>,
    data: StoreSnapshot,
    revision: StoreRevision,
}

impl<S: CollectionStorage> EntityStore<S> {
    /// Loads persisted collections (self-healing and migrating as needed).
    pub fn open(
        mut storage: S,
        config: StoreConfig,
        clock: Box<dyn Clock>,
    ) -> StoreResult<(Self, LoadReport)> {
        let outcome = load(&mut storage, &config, clock.today()).map_err(|source| {
            error!("event=store_open module=store status=error error={source}");
            StoreError::StorageFailure {
                operation: "open",
                source,
            }
        })?;

        let store = Self {
            storage,
            config,
            clock,
            data: outcome.data,
            revision: StoreRevision::new_session(),
        };
        Ok((store, outcome.report))
    }

    /// Ends the store lifecycle and hands the storage back.
    pub fn close(self) -> S {
        info!(
            "event=store_close module=store status=ok session={}",
            self.revision.session
        );
        self.storage
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Borrowed view of every collection.
    pub fn data(&self) -> &StoreSnapshot {
        &self.data
    }

    /// Owned deep copy of every collection.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.clone()
    }

    pub fn revision(&self) -> StoreRevision {
        self.revision
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Replaces every entity collection with `snapshot`.
    pub fn restore_snapshot(&mut self, snapshot: StoreSnapshot) -> StoreResult<()> {
        self.commit("restore_snapshot", &CollectionKey::ENTITY, |data, _| {
            *data = snapshot;
            Ok(())
        })
    }

    /// Rebuilds every task and placement from the contracts.
    pub fn regenerate_all_tasks(&mut self) -> StoreResult<()> {
        self.commit("regenerate_all_tasks", &CONTRACT_KEYS, |data, engine| {
            engine.regenerate_all(data);
            Ok(())
        })
    }

    /// Audits derived rows and fixes whatever drifted.
    ///
    /// Returns the findings from before the repair.
    pub fn repair(&mut self) -> StoreResult<ConsistencyReport> {
        let findings = audit(&self.data);
        if findings.needs_regeneration() {
            self.regenerate_all_tasks()?;
        } else if !findings.is_consistent() {
            self.commit("sync_kanban", &CONTRACT_KEYS, |data, _| {
                sync_kanban(data);
                Ok(())
            })?;
        }
        Ok(findings)
    }

    pub(crate) fn read_raw(&self, key: CollectionKey) -> StorageResult<Option<String>> {
        self.storage.read(key)
    }

    pub(crate) fn write_raw(&mut self, key: CollectionKey, payload: String) -> StorageResult<()> {
        self.storage.write_batch(&[CollectionWrite { key, payload }])
    }

    pub(crate) fn remove_raw(&mut self, key: CollectionKey) -> StorageResult<()> {
        self.storage.remove(key)
    }

    /// Applies `mutate` and persists `keys`, rolling back on any failure.
    fn commit<T>(
        &mut self,
        operation: &'static str,
        keys: &[CollectionKey],
        mutate: impl FnOnce(&mut StoreSnapshot, &DerivationEngine<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.commit_with(operation, WriteMode::Keys, keys, mutate)
    }

    pub(crate) fn commit_with<T>(
        &mut self,
        operation: &'static str,
        mode: WriteMode,
        keys: &[CollectionKey],
        mutate: impl FnOnce(&mut StoreSnapshot, &DerivationEngine<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let before = self.data.clone();
        let engine = DerivationEngine::new(&self.config, self.clock.today());

        let value = match mutate(&mut self.data, &engine) {
            Ok(value) => value,
            Err(err) => {
                self.data = before;
                return Err(err);
            }
        };

        if let Err(source) = persist(&mut self.storage, &self.data, mode, keys) {
            self.data = before;
            error!(
                "event=store_commit module=store status=error op={operation} duration_ms={} error={source}",
                started_at.elapsed().as_millis()
            );
            return Err(StoreError::StorageFailure { operation, source });
        }

        for key in keys {
            self.revision.bump(*key);
        }
        info!(
            "event=store_commit module=store status=ok op={operation} keys={} duration_ms={}",
            keys.len(),
            started_at.elapsed().as_millis()
        );
        Ok(value)
    }
}

fn persist<S: CollectionStorage>(
    storage: &mut S,
    data: &StoreSnapshot,
    mode: WriteMode,
    keys: &[CollectionKey],
) -> StorageResult<()> {
    let writes = keys
        .iter()
        .map(|key| {
            Ok(CollectionWrite {
                key: *key,
                payload: encode_collection(data, *key)?,
            })
        })
        .collect::<StorageResult<Vec<_>>>()?;

    match mode {
        WriteMode::Keys => storage.write_batch(&writes),
        WriteMode::ReplaceAll => storage.replace_all(&writes),
    }
}

/// Serializes one entity collection to its persisted JSON array.
pub(crate) fn encode_collection(data: &StoreSnapshot, key: CollectionKey) -> StorageResult<String> {
    let encoded = match key {
        CollectionKey::Contracts => serde_json::to_string(&data.contracts),
        CollectionKey::Objects => serde_json::to_string(&data.objects),
        CollectionKey::Engineers => serde_json::to_string(&data.engineers),
        CollectionKey::Tasks => serde_json::to_string(&data.tasks),
        CollectionKey::Kanban => serde_json::to_string(&data.kanban),
        CollectionKey::ContractKanban => serde_json::to_string(&data.contract_kanban),
        CollectionKey::MaintenanceReports => serde_json::to_string(&data.maintenance_reports),
        CollectionKey::AppHistory
        | CollectionKey::Notifications
        | CollectionKey::NotificationSettings => {
            return Err(StorageError::Rejected(format!(
                "`{key}` is not an entity collection"
            )));
        }
    };
    encoded.map_err(|source| StorageError::Serialize { key, source })
}
