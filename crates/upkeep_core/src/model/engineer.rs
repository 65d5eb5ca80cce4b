//! Service engineers referenced by contracts and reports.

use serde::{Deserialize, Serialize};

pub type EngineerId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEngineer {
    pub id: EngineerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

/// Input for `EntityStore::add_engineer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEngineer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub specialization: Option<String>,
}

impl NewEngineer {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Merge-patch for an engineer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineerPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub specialization: Option<String>,
}

impl EngineerPatch {
    pub(crate) fn apply(self, engineer: &mut ServiceEngineer) {
        if let Some(value) = self.name {
            engineer.name = value;
        }
        if let Some(value) = self.phone {
            engineer.phone = Some(value);
        }
        if let Some(value) = self.email {
            engineer.email = Some(value);
        }
        if let Some(value) = self.specialization {
            engineer.specialization = Some(value);
        }
    }
}
