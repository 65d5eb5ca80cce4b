//! Domain model for contracts, their maintenance windows and derived views.
//!
//! # Responsibility
//! - Define the persisted record shapes (camelCase JSON, snake_case enums).
//! - Keep status and column vocabularies as closed enums.
//!
//! # Invariants
//! - Contracts and objects are archived, never physically deleted.
//! - Tasks and kanban placements are derived rows; see `crate::derivation`.

pub mod contract;
pub mod engineer;
pub mod kanban;
pub mod object;
pub mod report;
pub mod snapshot;
pub mod task;

use uuid::Uuid;

/// Generates a new time-ordered record id.
pub(crate) fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}
