//! Cold-start loading of persisted collections.
//!
//! # Responsibility
//! - Read every entity collection independently.
//! - Drop corrupted blobs and undecodable records instead of failing the load.
//! - Upgrade legacy record shapes and seed defaults for an empty store.
//! - Repair derived rows that drifted from their sources.
//!
//! # Invariants
//! - Malformed persisted data never surfaces as an error; only storage
//!   transport failures do.
//! - Anything migrated, seeded or repaired is written back before returning.

mod legacy;

use legacy::migrate_record;

use crate::config::StoreConfig;
use crate::derivation::{audit, sync_kanban, DerivationEngine};
use crate::model::engineer::ServiceEngineer;
use crate::model::snapshot::StoreSnapshot;
use crate::storage::{CollectionKey, CollectionStorage, CollectionWrite, StorageResult};
use chrono::NaiveDate;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Something the loader recovered from locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadIssue {
    /// The blob under `key` could not be parsed; the key was removed and the
    /// collection started empty.
    MalformedPersisted { key: CollectionKey, message: String },
    /// One record under `key` could not be decoded and was left out; the
    /// rest of the collection loaded.
    DroppedRecord {
        key: CollectionKey,
        index: usize,
        message: String,
    },
}

impl Display for LoadIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPersisted { key, message } => {
                write!(f, "dropped malformed collection `{key}`: {message}")
            }
            Self::DroppedRecord {
                key,
                index,
                message,
            } => write!(f, "dropped record {index} of `{key}`: {message}"),
        }
    }
}

/// What happened during a cold start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub seeded: bool,
    pub issues: Vec<LoadIssue>,
    /// Records rewritten into the current shape.
    pub migrated_records: usize,
    /// Whether tasks had to be regenerated from contracts.
    pub regenerated: bool,
}

pub(crate) struct LoadOutcome {
    pub data: StoreSnapshot,
    pub report: LoadReport,
}

/// Default engineer roster for a brand-new store.
pub fn default_engineers() -> Vec<ServiceEngineer> {
    [
        ("1", "Ivan Petrov", "HVAC"),
        ("2", "Sergey Smirnov", "Fire safety"),
        ("3", "Alexey Volkov", "Electrical"),
    ]
    .into_iter()
    .map(|(id, name, specialization)| ServiceEngineer {
        id: id.to_string(),
        name: name.to_string(),
        phone: None,
        email: None,
        specialization: Some(specialization.to_string()),
    })
    .collect()
}

pub(crate) fn load<S: CollectionStorage>(
    storage: &mut S,
    config: &StoreConfig,
    today: NaiveDate,
) -> StorageResult<LoadOutcome> {
    let mut report = LoadReport::default();
    let mut dirty = BTreeSet::new();
    let mut data = StoreSnapshot::default();

    let stored = storage.stored_keys()?;
    let is_fresh = !CollectionKey::ENTITY.iter().any(|key| stored.contains(key));

    data.contracts = read_collection(storage, CollectionKey::Contracts, &mut report, &mut dirty)?;
    data.objects = read_collection(storage, CollectionKey::Objects, &mut report, &mut dirty)?;
    data.engineers = read_collection(storage, CollectionKey::Engineers, &mut report, &mut dirty)?;
    data.tasks = read_collection(storage, CollectionKey::Tasks, &mut report, &mut dirty)?;
    data.kanban = read_collection(storage, CollectionKey::Kanban, &mut report, &mut dirty)?;
    data.contract_kanban =
        read_collection(storage, CollectionKey::ContractKanban, &mut report, &mut dirty)?;
    data.maintenance_reports =
        read_collection(storage, CollectionKey::MaintenanceReports, &mut report, &mut dirty)?;

    if is_fresh && config.seed_default_engineers {
        data.engineers = default_engineers();
        dirty.insert(CollectionKey::Engineers);
        report.seeded = true;
        info!(
            "event=store_seed module=loader status=ok engineers={}",
            data.engineers.len()
        );
    }

    let consistency = audit(&data);
    if consistency.needs_regeneration() {
        warn!(
            "event=store_repair module=loader status=start orphan_tasks={} missing_tasks={}",
            consistency.orphan_tasks.len(),
            consistency.missing_tasks.len()
        );
        DerivationEngine::new(config, today).regenerate_all(&mut data);
        report.regenerated = true;
        dirty.extend([
            CollectionKey::Tasks,
            CollectionKey::Kanban,
            CollectionKey::ContractKanban,
        ]);
    } else if sync_kanban(&mut data) {
        dirty.extend([CollectionKey::Kanban, CollectionKey::ContractKanban]);
    }

    if !dirty.is_empty() {
        let writes = dirty
            .iter()
            .map(|key| {
                Ok(CollectionWrite {
                    key: *key,
                    payload: crate::store::encode_collection(&data, *key)?,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;
        storage.write_batch(&writes)?;
    }

    info!(
        "event=store_load module=loader status=ok contracts={} tasks={} issues={} migrated={} seeded={} regenerated={}",
        data.contracts.len(),
        data.tasks.len(),
        report.issues.len(),
        report.migrated_records,
        report.seeded,
        report.regenerated
    );
    Ok(LoadOutcome { data, report })
}

fn read_collection<S: CollectionStorage, T: DeserializeOwned>(
    storage: &mut S,
    key: CollectionKey,
    report: &mut LoadReport,
    dirty: &mut BTreeSet<CollectionKey>,
) -> StorageResult<Vec<T>> {
    let Some(raw) = storage.read(key)? else {
        return Ok(Vec::new());
    };

    match decode_collection(key, &raw) {
        Ok(decoded) => {
            if decoded.migrated > 0 || !decoded.rejected.is_empty() {
                report.migrated_records += decoded.migrated;
                dirty.insert(key);
            }
            for rejected in decoded.rejected {
                warn!(
                    "event=store_load module=loader status=recovered key={key} record={} error={}",
                    rejected.index, rejected.message
                );
                report.issues.push(LoadIssue::DroppedRecord {
                    key,
                    index: rejected.index,
                    message: rejected.message,
                });
            }
            Ok(decoded.records)
        }
        Err(message) => {
            warn!("event=store_load module=loader status=recovered key={key} error={message}");
            storage.remove(key)?;
            report
                .issues
                .push(LoadIssue::MalformedPersisted { key, message });
            Ok(Vec::new())
        }
    }
}

/// A decoded collection.
pub(crate) struct Decoded<T> {
    pub records: Vec<T>,
    /// Records rewritten by a legacy upgrade.
    pub migrated: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// A record that failed typed decoding after migration.
pub(crate) struct RejectedRecord {
    pub index: usize,
    pub message: String,
}

/// Parses a collection blob, upgrading legacy records on the way.
///
/// Fails only when the blob is not a JSON array. Records that still do not
/// decode are reported in [`Decoded::rejected`].
pub(crate) fn decode_collection<T: DeserializeOwned>(
    key: CollectionKey,
    raw: &str,
) -> Result<Decoded<T>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    decode_collection_value(key, value)
}

pub(crate) fn decode_collection_value<T: DeserializeOwned>(
    key: CollectionKey,
    value: Value,
) -> Result<Decoded<T>, String> {
    let Value::Array(records) = value else {
        return Err(format!("expected a JSON array for `{key}`"));
    };

    let mut decoded = Decoded {
        records: Vec::with_capacity(records.len()),
        migrated: 0,
        rejected: Vec::new(),
    };
    for (index, mut record) in records.into_iter().enumerate() {
        if migrate_record(key, &mut record) {
            decoded.migrated += 1;
        }
        match serde_json::from_value(record) {
            Ok(record) => decoded.records.push(record),
            Err(err) => decoded.rejected.push(RejectedRecord {
                index,
                message: err.to_string(),
            }),
        }
    }
    Ok(decoded)
}
