//! Versioned, scoped import/export envelopes.
//!
//! # Responsibility
//! - Serialize selected collections with a format version and export date.
//! - Parse incoming envelopes through the same legacy migrations as the loader.
//! - Replace collections atomically and repair derived rows afterwards.
//!
//! # Invariants
//! - A full import clears every persisted key, even for empty envelopes.
//! - A selective import never touches collections outside its scopes.
//! - A malformed collection fails the whole import; nothing is written.
//! - Imported contracts pass the same checks as contracts created locally.
//! - An import cannot drop an engineer that an active contract still assigns.

use crate::derivation::{audit, sync_kanban};
use crate::loader::decode_collection_value;
use crate::model::snapshot::StoreSnapshot;
use crate::storage::{CollectionKey, CollectionStorage};
use crate::store::{active_assignments, admit_contracts, EntityStore, StoreError, WriteMode};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Envelope format written by [`export_data`].
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Named group of collections moved together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    All,
    Contracts,
    Engineers,
}

impl DataScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Contracts => "contracts",
            Self::Engineers => "engineers",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "contracts" => Some(Self::Contracts),
            "engineers" => Some(Self::Engineers),
            _ => None,
        }
    }

    /// Collections covered by this scope.
    pub fn keys(self) -> &'static [CollectionKey] {
        match self {
            Self::All => &CollectionKey::ENTITY,
            Self::Contracts => &[
                CollectionKey::Contracts,
                CollectionKey::Objects,
                CollectionKey::Tasks,
                CollectionKey::Kanban,
                CollectionKey::ContractKanban,
                CollectionKey::MaintenanceReports,
            ],
            Self::Engineers => &[CollectionKey::Engineers],
        }
    }
}

impl Display for DataScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by import and export.
#[derive(Debug)]
pub enum TransferError {
    /// The payload carries no recognized collection.
    InvalidImportEnvelope(String),
    MalformedCollection { key: CollectionKey, message: String },
    Json(serde_json::Error),
    Store(StoreError),
}

impl Display for TransferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidImportEnvelope(message) => write!(f, "invalid import envelope: {message}"),
            Self::MalformedCollection { key, message } => {
                write!(f, "malformed `{key}` collection in import: {message}")
            }
            Self::Json(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<StoreError> for TransferError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Outgoing envelope; absent collections are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub export_date: DateTime<Utc>,
    pub version: String,
    pub data_types: Vec<DataScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contracts: Option<Vec<crate::model::contract::Contract>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<crate::model::object::ServiceObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineers: Option<Vec<crate::model::engineer::ServiceEngineer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<crate::model::task::MaintenanceTask>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kanban: Option<Vec<crate::model::kanban::TaskPlacement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_kanban: Option<Vec<crate::model::kanban::ContractPlacement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_reports: Option<Vec<crate::model::report::MaintenanceReport>>,
}

/// Parsed incoming envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportEnvelope {
    pub version: Option<String>,
    pub export_date: Option<String>,
    pub data_types: Vec<DataScope>,
    /// Collections found in the payload, already migrated.
    pub data: StoreSnapshot,
    /// Which collections the payload actually carried.
    pub present: BTreeSet<CollectionKey>,
    pub migrated_records: usize,
}

/// What an import changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub full: bool,
    pub replaced: Vec<CollectionKey>,
    pub migrated_records: usize,
    /// Whether derived rows had to be rebuilt from contracts.
    pub regenerated: bool,
    pub history_cleared: bool,
}

/// Builds an envelope for `scopes`. An empty scope list exports everything.
pub fn export_data<S: CollectionStorage>(
    store: &EntityStore<S>,
    scopes: &[DataScope],
) -> ExportEnvelope {
    let keys = scope_keys(scopes);
    let data = store.data();
    let pick = |key: CollectionKey| keys.contains(&key);

    let envelope = ExportEnvelope {
        export_date: store.clock().now(),
        version: EXPORT_FORMAT_VERSION.to_string(),
        data_types: normalized_scopes(scopes),
        contracts: pick(CollectionKey::Contracts).then(|| data.contracts.clone()),
        objects: pick(CollectionKey::Objects).then(|| data.objects.clone()),
        engineers: pick(CollectionKey::Engineers).then(|| data.engineers.clone()),
        tasks: pick(CollectionKey::Tasks).then(|| data.tasks.clone()),
        kanban: pick(CollectionKey::Kanban).then(|| data.kanban.clone()),
        contract_kanban: pick(CollectionKey::ContractKanban).then(|| data.contract_kanban.clone()),
        maintenance_reports: pick(CollectionKey::MaintenanceReports)
            .then(|| data.maintenance_reports.clone()),
    };
    info!(
        "event=export module=transfer status=ok scopes={} keys={}",
        scope_list(&envelope.data_types),
        keys.len()
    );
    envelope
}

pub fn export_json<S: CollectionStorage>(
    store: &EntityStore<S>,
    scopes: &[DataScope],
) -> Result<String, TransferError> {
    Ok(serde_json::to_string_pretty(&export_data(store, scopes))?)
}

/// Parses an envelope, accepting camelCase and snake_case collection names.
pub fn parse_envelope(raw: &str) -> Result<ImportEnvelope, TransferError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(mut root) = value else {
        return Err(TransferError::InvalidImportEnvelope(
            "expected a JSON object".to_string(),
        ));
    };

    let mut envelope = ImportEnvelope {
        version: take_string(&mut root, &["version"]),
        export_date: take_string(&mut root, &["exportDate", "export_date"]),
        data_types: take_scopes(&mut root),
        data: StoreSnapshot::default(),
        present: BTreeSet::new(),
        migrated_records: 0,
    };

    for key in CollectionKey::ENTITY {
        let Some(value) = take_field(&mut root, envelope_names(key)) else {
            continue;
        };
        let migrated = decode_into(&mut envelope.data, key, value)
            .map_err(|message| TransferError::MalformedCollection { key, message })?;
        envelope.migrated_records += migrated;
        envelope.present.insert(key);
    }

    if envelope.present.is_empty() {
        return Err(TransferError::InvalidImportEnvelope(
            "no recognized collection found".to_string(),
        ));
    }
    if let Some(version) = envelope.version.as_deref() {
        if version != EXPORT_FORMAT_VERSION {
            warn!("event=import_parse module=transfer status=warn version={version}");
        }
    }
    Ok(envelope)
}

/// Applies `envelope` to the store.
///
/// With [`DataScope::All`] (or no scopes) every persisted key is cleared and the
/// envelope's collections become the whole store. Otherwise only the
/// collections of the requested scopes that the envelope carries are replaced.
pub fn import_data<S: CollectionStorage>(
    store: &mut EntityStore<S>,
    envelope: ImportEnvelope,
    scopes: &[DataScope],
) -> Result<ImportReport, TransferError> {
    let full = scopes.is_empty() || scopes.contains(&DataScope::All);
    let ImportEnvelope {
        data: mut incoming,
        present,
        migrated_records,
        ..
    } = envelope;

    let replaced: Vec<CollectionKey> = if full {
        CollectionKey::ENTITY.to_vec()
    } else {
        scope_keys(scopes)
            .into_iter()
            .filter(|key| present.contains(key))
            .collect()
    };

    if replaced.is_empty() {
        info!(
            "event=import module=transfer status=skipped scopes={} reason=no_matching_collections",
            scope_list(scopes)
        );
        return Ok(ImportReport {
            full,
            replaced,
            migrated_records,
            regenerated: false,
            history_cleared: false,
        });
    }

    let (mode, keys) = if full {
        (WriteMode::ReplaceAll, CollectionKey::ENTITY.to_vec())
    } else {
        let mut keys: BTreeSet<CollectionKey> = replaced.iter().copied().collect();
        keys.extend([
            CollectionKey::Tasks,
            CollectionKey::Kanban,
            CollectionKey::ContractKanban,
        ]);
        (WriteMode::Keys, keys.into_iter().collect())
    };

    let regenerated = store.commit_with("import", mode, &keys, |data, engine| {
        let previous_engineers: Vec<String> = data
            .engineers
            .iter()
            .map(|engineer| engineer.id.clone())
            .collect();
        if full {
            *data = std::mem::take(&mut incoming);
        } else {
            for key in &replaced {
                transplant(data, &mut incoming, *key);
            }
        }

        if replaced.contains(&CollectionKey::Contracts) {
            admit_contracts(&mut data.contracts)?;
        }
        if replaced.contains(&CollectionKey::Engineers) {
            ensure_roster_covers_assignments(data, &previous_engineers)?;
        }

        let findings = audit(data);
        if findings.needs_regeneration() {
            engine.regenerate_all(data);
            Ok(true)
        } else {
            sync_kanban(data);
            Ok(false)
        }
    })?;

    info!(
        "event=import module=transfer status=ok full={full} replaced={} migrated={migrated_records} regenerated={regenerated}",
        replaced.len()
    );
    Ok(ImportReport {
        full,
        replaced,
        migrated_records,
        regenerated,
        history_cleared: full,
    })
}

/// Rejects a roster that drops an engineer some active contract still assigns.
fn ensure_roster_covers_assignments(
    data: &StoreSnapshot,
    previous_engineers: &[String],
) -> Result<(), StoreError> {
    let removed = previous_engineers
        .iter()
        .filter(|id| !data.engineers.iter().any(|engineer| &engineer.id == *id));
    for engineer_id in removed {
        let blocking = active_assignments(&data.contracts, engineer_id);
        if !blocking.is_empty() {
            warn!(
                "event=import module=transfer status=rejected engineer_id={engineer_id} blocking_contracts={}",
                blocking.len()
            );
            return Err(StoreError::ReferentialConstraint {
                engineer_id: engineer_id.clone(),
                contract_ids: blocking,
            });
        }
    }
    Ok(())
}

fn normalized_scopes(scopes: &[DataScope]) -> Vec<DataScope> {
    if scopes.is_empty() {
        return vec![DataScope::All];
    }
    let unique: BTreeSet<DataScope> = scopes.iter().copied().collect();
    unique.into_iter().collect()
}

/// Union of the scopes' keys in [`CollectionKey::ENTITY`] order.
fn scope_keys(scopes: &[DataScope]) -> Vec<CollectionKey> {
    let scopes = normalized_scopes(scopes);
    CollectionKey::ENTITY
        .into_iter()
        .filter(|key| scopes.iter().any(|scope| scope.keys().contains(key)))
        .collect()
}

fn scope_list(scopes: &[DataScope]) -> String {
    scopes
        .iter()
        .map(|scope| scope.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Accepted top-level names for a collection, preferred spelling first.
fn envelope_names(key: CollectionKey) -> &'static [&'static str] {
    match key {
        CollectionKey::ContractKanban => &["contractKanban", "contract_kanban"],
        CollectionKey::MaintenanceReports => &["maintenanceReports", "maintenance_reports"],
        CollectionKey::Contracts => &["contracts"],
        CollectionKey::Objects => &["objects"],
        CollectionKey::Engineers => &["engineers"],
        CollectionKey::Tasks => &["tasks"],
        CollectionKey::Kanban => &["kanban"],
        CollectionKey::AppHistory
        | CollectionKey::Notifications
        | CollectionKey::NotificationSettings => &[],
    }
}

fn take_field(root: &mut Map<String, Value>, names: &[&str]) -> Option<Value> {
    names.iter().find_map(|name| root.remove(*name))
}

fn take_string(root: &mut Map<String, Value>, names: &[&str]) -> Option<String> {
    match take_field(root, names)? {
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Unknown scope names are ignored; they only describe the payload.
fn take_scopes(root: &mut Map<String, Value>) -> Vec<DataScope> {
    let Some(Value::Array(items)) = take_field(root, &["dataTypes", "data_types"]) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .filter_map(DataScope::parse)
        .collect()
}

fn decode_into(data: &mut StoreSnapshot, key: CollectionKey, value: Value) -> Result<usize, String> {
    let migrated = match key {
        CollectionKey::Contracts => assign(&mut data.contracts, key, value)?,
        CollectionKey::Objects => assign(&mut data.objects, key, value)?,
        CollectionKey::Engineers => assign(&mut data.engineers, key, value)?,
        CollectionKey::Tasks => assign(&mut data.tasks, key, value)?,
        CollectionKey::Kanban => assign(&mut data.kanban, key, value)?,
        CollectionKey::ContractKanban => assign(&mut data.contract_kanban, key, value)?,
        CollectionKey::MaintenanceReports => {
            assign(&mut data.maintenance_reports, key, value)?
        }
        CollectionKey::AppHistory
        | CollectionKey::Notifications
        | CollectionKey::NotificationSettings => 0,
    };
    Ok(migrated)
}

fn assign<T: serde::de::DeserializeOwned>(
    slot: &mut Vec<T>,
    key: CollectionKey,
    value: Value,
) -> Result<usize, String> {
    let decoded = decode_collection_value(key, value)?;
    if let Some(rejected) = decoded.rejected.first() {
        return Err(format!("record {}: {}", rejected.index, rejected.message));
    }
    *slot = decoded.records;
    Ok(decoded.migrated)
}

fn transplant(target: &mut StoreSnapshot, source: &mut StoreSnapshot, key: CollectionKey) {
    use std::mem::take;
    match key {
        CollectionKey::Contracts => target.contracts = take(&mut source.contracts),
        CollectionKey::Objects => target.objects = take(&mut source.objects),
        CollectionKey::Engineers => target.engineers = take(&mut source.engineers),
        CollectionKey::Tasks => target.tasks = take(&mut source.tasks),
        CollectionKey::Kanban => target.kanban = take(&mut source.kanban),
        CollectionKey::ContractKanban => {
            target.contract_kanban = take(&mut source.contract_kanban)
        }
        CollectionKey::MaintenanceReports => {
            target.maintenance_reports = take(&mut source.maintenance_reports)
        }
        CollectionKey::AppHistory
        | CollectionKey::Notifications
        | CollectionKey::NotificationSettings => {}
    }
}
