//! Persisted collection layout and the storage seam.
//!
//! # Responsibility
//! - Name every persisted collection key.
//! - Define the storage contract used by the loader, store and history.
//!
//! # Invariants
//! - One serialized payload per key; payloads are opaque JSON text here.
//! - `write_batch` and `replace_all` are all-or-nothing.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

pub use sqlite::SqliteCollectionStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// Fixed persisted collection keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionKey {
    Contracts,
    Objects,
    Engineers,
    Tasks,
    Kanban,
    ContractKanban,
    MaintenanceReports,
    AppHistory,
    Notifications,
    NotificationSettings,
}

impl CollectionKey {
    /// Every key, in storage order.
    pub const ALL: [CollectionKey; 10] = [
        Self::Contracts,
        Self::Objects,
        Self::Engineers,
        Self::Tasks,
        Self::Kanban,
        Self::ContractKanban,
        Self::MaintenanceReports,
        Self::AppHistory,
        Self::Notifications,
        Self::NotificationSettings,
    ];

    /// Keys that make up a store snapshot.
    pub const ENTITY: [CollectionKey; 7] = [
        Self::Contracts,
        Self::Objects,
        Self::Engineers,
        Self::Tasks,
        Self::Kanban,
        Self::ContractKanban,
        Self::MaintenanceReports,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contracts => "contracts",
            Self::Objects => "objects",
            Self::Engineers => "engineers",
            Self::Tasks => "tasks",
            Self::Kanban => "kanban",
            Self::ContractKanban => "contract_kanban",
            Self::MaintenanceReports => "maintenance_reports",
            Self::AppHistory => "app_history",
            Self::Notifications => "notifications",
            Self::NotificationSettings => "notification_settings",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

impl Display for CollectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending key write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionWrite {
    pub key: CollectionKey,
    pub payload: String,
}

/// Storage transport errors.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    Serialize {
        key: CollectionKey,
        source: serde_json::Error,
    },
    /// Raised by storage backends that refuse a write for their own reasons.
    Rejected(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialize { key, source } => {
                write!(f, "failed to serialize collection `{key}`: {source}")
            }
            Self::Rejected(message) => write!(f, "storage rejected write: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialize { source, .. } => Some(source),
            Self::Rejected(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key/value persistence contract for collection payloads.
pub trait CollectionStorage {
    /// Reads one payload; `None` when the key was never written or removed.
    fn read(&self, key: CollectionKey) -> StorageResult<Option<String>>;
    /// Writes all payloads atomically, replacing previous values.
    fn write_batch(&mut self, writes: &[CollectionWrite]) -> StorageResult<()>;
    /// Removes one key. Removing an absent key is not an error.
    fn remove(&mut self, key: CollectionKey) -> StorageResult<()>;
    /// Clears every key, then writes `writes`, in one atomic step.
    fn replace_all(&mut self, writes: &[CollectionWrite]) -> StorageResult<()>;
    /// Lists keys currently holding a payload.
    fn stored_keys(&self) -> StorageResult<Vec<CollectionKey>>;
}
