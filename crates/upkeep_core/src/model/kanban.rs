//! Derived kanban board placements.
//!
//! # Invariants
//! - Task columns come only from [`TaskColumn::for_status`].
//! - Contract columns are the contract status verbatim.

use super::contract::ContractStatus;
use super::task::TaskStatus;
use serde::{Deserialize, Serialize};

/// Task board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskColumn {
    Todo,
    InProgress,
    Completed,
}

impl TaskColumn {
    /// The single status-to-column table for tasks.
    pub fn for_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Planned => Self::Todo,
            TaskStatus::InProgress => Self::InProgress,
            TaskStatus::Completed => Self::Completed,
        }
    }
}

/// Placement of one task on the task board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlacement {
    pub task_id: String,
    pub contract_id: String,
    pub column: TaskColumn,
    pub order: u32,
}

/// Placement of one contract on the contract board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractPlacement {
    pub contract_id: String,
    pub column: ContractStatus,
    pub order: u32,
}
