//! Contract and maintenance-period records.
//!
//! # Invariants
//! - `contract_number` is unique among non-archived contracts (enforced by
//!   the store, not here).
//! - Period ids are unique within one contract and never contain the task-id
//!   separator.
//! - Period status never moves backwards through automatic processing.

use super::new_record_id;
use super::task::TASK_ID_SEPARATOR;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ContractId = String;
pub type PeriodId = String;

/// Contract lifecycle state. Also the contract-kanban column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    FinalWorks,
    Extension,
    Completed,
    Archived,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::FinalWorks => "final_works",
            Self::Extension => "extension",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

/// Maintenance-window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Planned,
    Adjusted,
    Completed,
}

impl PeriodStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Planned => 0,
            Self::Adjusted => 1,
            Self::Completed => 2,
        }
    }

    /// Moves towards `target` only if it is further along the lifecycle.
    pub fn advance_to(self, target: PeriodStatus) -> PeriodStatus {
        if target.rank() > self.rank() {
            target
        } else {
            self
        }
    }
}

/// One declared maintenance window of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenancePeriod {
    pub id: PeriodId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_end_date: Option<NaiveDate>,
    pub status: PeriodStatus,
    #[serde(default)]
    pub departments: Vec<String>,
}

impl MaintenancePeriod {
    /// Creates a planned period with a generated id.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: new_record_id(),
            start_date,
            end_date,
            adjusted_start_date: None,
            adjusted_end_date: None,
            status: PeriodStatus::Planned,
            departments: Vec::new(),
        }
    }

    /// Day midpoint of the declared window, rounded towards the start.
    pub fn midpoint(&self) -> NaiveDate {
        let half = (self.end_date - self.start_date).num_days().div_euclid(2);
        self.start_date + chrono::Duration::days(half)
    }

    pub fn has_adjustment(&self) -> bool {
        self.adjusted_start_date.is_some() || self.adjusted_end_date.is_some()
    }
}

/// Canonical contract record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: ContractId,
    pub contract_number: String,
    pub client_name: String,
    pub object_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ContractStatus,
    #[serde(default)]
    pub maintenance_periods: Vec<MaintenancePeriod>,
    #[serde(default)]
    pub assigned_engineer_ids: Vec<String>,
    #[serde(default)]
    pub work_types: Vec<String>,
    #[serde(default)]
    pub equipment_type: String,
    /// Visit interval in months.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_months: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Contract {
    pub fn is_archived(&self) -> bool {
        self.status == ContractStatus::Archived
    }

    pub fn period(&self, period_id: &str) -> Option<&MaintenancePeriod> {
        self.maintenance_periods.iter().find(|p| p.id == period_id)
    }

    /// Checks record-local rules. Cross-record rules live in the store.
    pub fn validate(&self) -> Result<(), ContractValidationError> {
        if self.contract_number.trim().is_empty() {
            return Err(ContractValidationError::BlankContractNumber);
        }
        if self.end_date < self.start_date {
            return Err(ContractValidationError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        let mut seen = HashSet::new();
        for period in &self.maintenance_periods {
            if period.id.contains(TASK_ID_SEPARATOR) {
                return Err(ContractValidationError::InvalidPeriodId(period.id.clone()));
            }
            if period.end_date < period.start_date {
                return Err(ContractValidationError::InvalidPeriodRange {
                    period_id: period.id.clone(),
                });
            }
            if let (Some(start), Some(end)) = (period.adjusted_start_date, period.adjusted_end_date)
            {
                if end < start {
                    return Err(ContractValidationError::InvalidPeriodRange {
                        period_id: period.id.clone(),
                    });
                }
            }
            if !seen.insert(period.id.as_str()) {
                return Err(ContractValidationError::DuplicatePeriodId(period.id.clone()));
            }
        }

        Ok(())
    }

    /// Normalizes set-like fields and fills blank period ids.
    ///
    /// Planned periods that carry adjusted dates advance to `adjusted`.
    pub(crate) fn normalize(&mut self) {
        self.contract_number = self.contract_number.trim().to_string();
        dedup_in_order(&mut self.assigned_engineer_ids);
        dedup_in_order(&mut self.work_types);
        for period in &mut self.maintenance_periods {
            if period.id.trim().is_empty() {
                period.id = new_record_id();
            }
            if period.has_adjustment() {
                period.status = period.status.advance_to(PeriodStatus::Adjusted);
            }
            dedup_in_order(&mut period.departments);
        }
    }
}

/// Input for `EntityStore::add_contract`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContract {
    pub contract_number: String,
    pub client_name: String,
    pub object_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ContractStatus,
    pub maintenance_periods: Vec<MaintenancePeriod>,
    pub assigned_engineer_ids: Vec<String>,
    pub work_types: Vec<String>,
    pub equipment_type: String,
    pub frequency_months: Option<u32>,
    pub notes: Option<String>,
}

impl NewContract {
    /// Active contract without periods, engineers or work types.
    pub fn new(
        contract_number: impl Into<String>,
        client_name: impl Into<String>,
        object_id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            contract_number: contract_number.into(),
            client_name: client_name.into(),
            object_id: object_id.into(),
            start_date,
            end_date,
            status: ContractStatus::Active,
            maintenance_periods: Vec::new(),
            assigned_engineer_ids: Vec::new(),
            work_types: Vec::new(),
            equipment_type: String::new(),
            frequency_months: None,
            notes: None,
        }
    }

    pub(crate) fn into_contract(self, id: ContractId) -> Contract {
        Contract {
            id,
            contract_number: self.contract_number,
            client_name: self.client_name,
            object_id: self.object_id,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            maintenance_periods: self.maintenance_periods,
            assigned_engineer_ids: self.assigned_engineer_ids,
            work_types: self.work_types,
            equipment_type: self.equipment_type,
            frequency_months: self.frequency_months,
            notes: self.notes,
        }
    }
}

/// Merge-patch for a contract. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractPatch {
    pub contract_number: Option<String>,
    pub client_name: Option<String>,
    pub object_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ContractStatus>,
    pub maintenance_periods: Option<Vec<MaintenancePeriod>>,
    pub assigned_engineer_ids: Option<Vec<String>>,
    pub work_types: Option<Vec<String>>,
    pub equipment_type: Option<String>,
    pub frequency_months: Option<u32>,
    pub notes: Option<String>,
}

impl ContractPatch {
    /// Whether applying this patch changes the inputs of task generation.
    pub fn touches_derivation(&self) -> bool {
        self.maintenance_periods.is_some()
            || self.assigned_engineer_ids.is_some()
            || self.work_types.is_some()
            || self.object_id.is_some()
    }

    pub(crate) fn apply(self, contract: &mut Contract) {
        if let Some(value) = self.contract_number {
            contract.contract_number = value;
        }
        if let Some(value) = self.client_name {
            contract.client_name = value;
        }
        if let Some(value) = self.object_id {
            contract.object_id = value;
        }
        if let Some(value) = self.start_date {
            contract.start_date = value;
        }
        if let Some(value) = self.end_date {
            contract.end_date = value;
        }
        if let Some(value) = self.status {
            contract.status = value;
        }
        if let Some(value) = self.maintenance_periods {
            contract.maintenance_periods = value;
        }
        if let Some(value) = self.assigned_engineer_ids {
            contract.assigned_engineer_ids = value;
        }
        if let Some(value) = self.work_types {
            contract.work_types = value;
        }
        if let Some(value) = self.equipment_type {
            contract.equipment_type = value;
        }
        if let Some(value) = self.frequency_months {
            contract.frequency_months = Some(value);
        }
        if let Some(value) = self.notes {
            contract.notes = Some(value);
        }
    }
}

/// Record-local contract validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractValidationError {
    BlankContractNumber,
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    InvalidPeriodRange { period_id: PeriodId },
    DuplicatePeriodId(PeriodId),
    /// The period id contains the task-id separator.
    InvalidPeriodId(PeriodId),
}

impl Display for ContractValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankContractNumber => write!(f, "contract number must not be blank"),
            Self::InvalidDateRange { start, end } => {
                write!(f, "contract ends ({end}) before it starts ({start})")
            }
            Self::InvalidPeriodRange { period_id } => {
                write!(f, "maintenance period `{period_id}` ends before it starts")
            }
            Self::DuplicatePeriodId(id) => write!(f, "duplicate maintenance period id `{id}`"),
            Self::InvalidPeriodId(id) => write!(
                f,
                "maintenance period id `{id}` must not contain `{TASK_ID_SEPARATOR}`"
            ),
        }
    }
}

impl Error for ContractValidationError {}

fn dedup_in_order(values: &mut Vec<String>) {
    let mut seen = HashSet::new();
    values.retain(|value| seen.insert(value.clone()));
}

#[cfg(test)]
mod tests {
    use super::{MaintenancePeriod, PeriodStatus};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn midpoint_floors_towards_start() {
        let period = MaintenancePeriod::new(date(2024, 3, 1), date(2024, 3, 15));
        assert_eq!(period.midpoint(), date(2024, 3, 8));

        let even = MaintenancePeriod::new(date(2024, 3, 1), date(2024, 3, 2));
        assert_eq!(even.midpoint(), date(2024, 3, 1));
    }

    #[test]
    fn period_status_never_regresses() {
        assert_eq!(
            PeriodStatus::Completed.advance_to(PeriodStatus::Adjusted),
            PeriodStatus::Completed
        );
        assert_eq!(
            PeriodStatus::Planned.advance_to(PeriodStatus::Adjusted),
            PeriodStatus::Adjusted
        );
    }
}
