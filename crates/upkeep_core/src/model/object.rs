//! Serviced objects (sites/buildings) referenced by contracts.

use serde::{Deserialize, Serialize};

pub type ObjectId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceObject {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default = "active_object")]
    pub status: ObjectStatus,
}

fn active_object() -> ObjectStatus {
    ObjectStatus::Active
}

/// Input for `EntityStore::add_object`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewObject {
    pub name: String,
    pub address: String,
    pub client_name: Option<String>,
}

/// Merge-patch for an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub client_name: Option<String>,
    pub status: Option<ObjectStatus>,
}

impl ObjectPatch {
    pub(crate) fn apply(self, object: &mut ServiceObject) {
        if let Some(value) = self.name {
            object.name = value;
        }
        if let Some(value) = self.address {
            object.address = value;
        }
        if let Some(value) = self.client_name {
            object.client_name = Some(value);
        }
        if let Some(value) = self.status {
            object.status = value;
        }
    }
}
