//! Maintenance reports filed against contracts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A filed visit report. With `task_id` set it closes out that task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub id: String,
    pub contract_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub engineer_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub work_performed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Input for `EntityStore::add_report`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub contract_id: String,
    pub task_id: Option<String>,
    pub engineer_id: String,
    pub date: NaiveDate,
    pub work_performed: String,
    pub notes: Option<String>,
}
