//! Embedded data layer for maintenance scheduling.
//! This crate is the single source of truth for contract, task and board invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod derivation;
pub mod history;
pub mod loader;
pub mod logging;
pub mod model;
pub mod storage;
pub mod store;
pub mod transfer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{PastPeriodPolicy, StoreConfig};
pub use derivation::{audit, ConsistencyReport, DerivationEngine};
pub use history::{HistoryEntry, HistoryError, HistoryLog, HistoryManager, SaveOutcome, SaveThrottle};
pub use loader::{LoadIssue, LoadReport};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::contract::{
    Contract, ContractPatch, ContractStatus, MaintenancePeriod, NewContract, PeriodStatus,
};
pub use model::kanban::{ContractPlacement, TaskColumn, TaskPlacement};
pub use model::snapshot::{StoreRevision, StoreSnapshot};
pub use model::task::{MaintenanceTask, TaskStatus};
pub use storage::{CollectionKey, CollectionStorage, SqliteCollectionStorage, StorageError};
pub use store::{EntityKind, EntityStore, StoreError, StoreResult};
pub use transfer::{
    export_data, export_json, import_data, parse_envelope, DataScope, ExportEnvelope,
    ImportEnvelope, ImportReport, TransferError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
