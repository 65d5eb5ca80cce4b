//! Whole-store snapshots and per-collection revision counters.

use super::contract::Contract;
use super::engineer::ServiceEngineer;
use super::kanban::{ContractPlacement, TaskPlacement};
use super::object::ServiceObject;
use super::report::MaintenanceReport;
use super::task::MaintenanceTask;
use crate::storage::CollectionKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owned copy of every entity collection at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub objects: Vec<ServiceObject>,
    #[serde(default)]
    pub engineers: Vec<ServiceEngineer>,
    #[serde(default)]
    pub tasks: Vec<MaintenanceTask>,
    #[serde(default)]
    pub kanban: Vec<TaskPlacement>,
    #[serde(default)]
    pub contract_kanban: Vec<ContractPlacement>,
    #[serde(default)]
    pub maintenance_reports: Vec<MaintenanceReport>,
}

impl StoreSnapshot {
    /// Row counts in [`CollectionKey::ENTITY`] order.
    pub fn lengths(&self) -> [usize; 7] {
        [
            self.contracts.len(),
            self.objects.len(),
            self.engineers.len(),
            self.tasks.len(),
            self.kanban.len(),
            self.contract_kanban.len(),
            self.maintenance_reports.len(),
        ]
    }

    /// Structural comparison with a cheap length check first.
    pub fn same_content(&self, other: &StoreSnapshot) -> bool {
        self.lengths() == other.lengths() && self == other
    }
}

/// Mutation counters for one store instance.
///
/// Two revisions compare equal only when they come from the same store
/// session and no collection changed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRevision {
    pub session: Uuid,
    pub counters: [u64; 7],
}

impl StoreRevision {
    pub fn new_session() -> Self {
        Self {
            session: Uuid::new_v4(),
            counters: [0; 7],
        }
    }

    pub(crate) fn bump(&mut self, key: CollectionKey) {
        if let Some(index) = CollectionKey::ENTITY.iter().position(|k| *k == key) {
            self.counters[index] += 1;
        }
    }

    pub fn counter(&self, key: CollectionKey) -> Option<u64> {
        CollectionKey::ENTITY
            .iter()
            .position(|k| *k == key)
            .map(|index| self.counters[index])
    }
}
