//! Derived maintenance tasks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type TaskId = String;

/// Task progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    InProgress,
    Completed,
}

/// One schedulable visit materialized from a maintenance period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceTask {
    pub id: TaskId,
    pub contract_id: String,
    pub object_id: String,
    pub engineer_id: String,
    pub scheduled_date: NaiveDate,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<NaiveDate>,
    /// Planned effort in hours.
    pub duration: u32,
    pub maintenance_period_id: String,
}

/// Joins the contract and period parts of a task id.
pub const TASK_ID_SEPARATOR: char = ':';

/// Deterministic task id for one contract period.
///
/// Stable across regenerations, so reports keep pointing at the same task.
/// Period ids never contain [`TASK_ID_SEPARATOR`], so the id splits back at
/// its last separator even when the contract id contains one.
pub fn task_id_for(contract_id: &str, period_id: &str) -> TaskId {
    format!("{contract_id}{TASK_ID_SEPARATOR}{period_id}")
}
