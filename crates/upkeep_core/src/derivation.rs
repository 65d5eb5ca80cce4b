//! Task and kanban derivation.
//!
//! # Responsibility
//! - Materialize maintenance tasks from contract periods.
//! - Keep both kanban boards in step with task and contract status.
//! - Detect derived rows that drifted from their sources.
//!
//! # Invariants
//! - Derived rows are replaced wholesale per contract, never patched.
//!   Task-level edits made outside this pipeline are discarded on the next
//!   regeneration.
//! - Every task has exactly one placement, in `TaskColumn::for_status`.
//! - Every contract has exactly one placement, in its status column.
//! - Orders are dense (`0..n`) within each column.

use crate::config::{PastPeriodPolicy, StoreConfig};
use crate::model::contract::{Contract, MaintenancePeriod, PeriodStatus};
use crate::model::kanban::{ContractPlacement, TaskColumn, TaskPlacement};
use crate::model::report::MaintenanceReport;
use crate::model::snapshot::StoreSnapshot;
use crate::model::task::{task_id_for, MaintenanceTask, TaskStatus};
use chrono::NaiveDate;
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

/// Generates tasks for contracts as of a given day.
pub struct DerivationEngine<'a> {
    config: &'a StoreConfig,
    today: NaiveDate,
}

impl<'a> DerivationEngine<'a> {
    pub fn new(config: &'a StoreConfig, today: NaiveDate) -> Self {
        Self { config, today }
    }

    /// Builds one task per maintenance period of `contract`.
    pub fn generate_tasks(
        &self,
        contract: &Contract,
        reports: &[MaintenanceReport],
    ) -> Vec<MaintenanceTask> {
        let engineer_id = contract
            .assigned_engineer_ids
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.fallback_engineer_id.clone());
        let duration = task_duration(contract);
        let mut seen_periods = HashSet::new();

        contract
            .maintenance_periods
            .iter()
            .enumerate()
            .filter(|(_, period)| seen_periods.insert(period.id.as_str()))
            .map(|(index, period)| {
                let id = task_id_for(&contract.id, &period.id);
                let scheduled_date = period.midpoint();
                let (status, completed_date) =
                    self.task_status(index, period, &id, scheduled_date, reports);
                MaintenanceTask {
                    id,
                    contract_id: contract.id.clone(),
                    object_id: contract.object_id.clone(),
                    engineer_id: engineer_id.clone(),
                    scheduled_date,
                    status,
                    completed_date,
                    duration,
                    maintenance_period_id: period.id.clone(),
                }
            })
            .collect()
    }

    fn task_status(
        &self,
        index: usize,
        period: &MaintenancePeriod,
        task_id: &str,
        scheduled_date: NaiveDate,
        reports: &[MaintenanceReport],
    ) -> (TaskStatus, Option<NaiveDate>) {
        let closed_on = reports
            .iter()
            .filter(|report| report.task_id.as_deref() == Some(task_id))
            .map(|report| report.date)
            .max();
        if let Some(date) = closed_on {
            return (TaskStatus::Completed, Some(date));
        }
        if period.status == PeriodStatus::Completed {
            return (TaskStatus::Completed, Some(scheduled_date));
        }
        if scheduled_date >= self.today {
            return (TaskStatus::Planned, None);
        }

        match self.config.past_period_policy {
            PastPeriodPolicy::IndexModulo if index % 3 == 0 => {
                (TaskStatus::Completed, Some(scheduled_date))
            }
            PastPeriodPolicy::IndexModulo if index % 2 == 0 => (TaskStatus::InProgress, None),
            PastPeriodPolicy::IndexModulo | PastPeriodPolicy::KeepPlanned => {
                (TaskStatus::Planned, None)
            }
        }
    }

    /// Drops and rebuilds every task and task placement of one contract.
    ///
    /// A contract id that no longer exists just loses its derived rows.
    pub fn regenerate_contract(&self, data: &mut StoreSnapshot, contract_id: &str) {
        data.tasks.retain(|task| task.contract_id != contract_id);
        data.kanban
            .retain(|placement| placement.contract_id != contract_id);

        if let Some(contract) = data.contracts.iter().find(|c| c.id == contract_id) {
            let tasks = self.generate_tasks(contract, &data.maintenance_reports);
            debug!(
                "event=tasks_regenerate module=derivation status=ok contract_id={contract_id} tasks={}",
                tasks.len()
            );
            data.tasks.extend(tasks);
        }

        sync_kanban(data);
    }

    /// Rebuilds every task and both boards from the contracts.
    pub fn regenerate_all(&self, data: &mut StoreSnapshot) {
        let mut tasks = Vec::new();
        for contract in &data.contracts {
            tasks.extend(self.generate_tasks(contract, &data.maintenance_reports));
        }
        data.tasks = tasks;
        data.kanban.clear();
        sync_kanban(data);
        debug!(
            "event=tasks_regenerate_all module=derivation status=ok contracts={} tasks={}",
            data.contracts.len(),
            data.tasks.len()
        );
    }
}

/// Planned hours: two per work type plus two for travel/setup.
pub fn task_duration(contract: &Contract) -> u32 {
    let work_types = u32::try_from(contract.work_types.len()).unwrap_or(u32::MAX);
    work_types.saturating_mul(2).saturating_add(2)
}

/// Re-syncs both boards with current task and contract status.
///
/// Returns whether anything changed; a second call always returns `false`.
pub fn sync_kanban(data: &mut StoreSnapshot) -> bool {
    let task_columns: HashMap<&str, (&str, TaskColumn)> = data
        .tasks
        .iter()
        .map(|task| {
            (
                task.id.as_str(),
                (task.contract_id.as_str(), TaskColumn::for_status(task.status)),
            )
        })
        .collect();
    let task_order: Vec<&str> = data.tasks.iter().map(|task| task.id.as_str()).collect();

    let kanban = reconcile(
        &data.kanban,
        &task_order,
        |placement| placement.task_id.as_str(),
        |placement| placement.order,
        |id, order| {
            let (contract_id, column) = task_columns[id];
            TaskPlacement {
                task_id: id.to_string(),
                contract_id: contract_id.to_string(),
                column,
                order,
            }
        },
        |id| task_columns[id].1,
    );

    let contract_columns: HashMap<&str, _> = data
        .contracts
        .iter()
        .map(|contract| (contract.id.as_str(), contract.status))
        .collect();
    let contract_order: Vec<&str> = data.contracts.iter().map(|c| c.id.as_str()).collect();

    let contract_kanban = reconcile(
        &data.contract_kanban,
        &contract_order,
        |placement| placement.contract_id.as_str(),
        |placement| placement.order,
        |id, order| ContractPlacement {
            contract_id: id.to_string(),
            column: contract_columns[id],
            order,
        },
        |id| contract_columns[id],
    );

    let changed = kanban != data.kanban || contract_kanban != data.contract_kanban;
    data.kanban = kanban;
    data.contract_kanban = contract_kanban;
    changed
}

/// Rebuilds one board: keeps the first placement per live entity, appends
/// missing ones, moves each to its expected column and renumbers densely.
fn reconcile<P, C: Copy + Ord + Hash>(
    existing: &[P],
    live_ids: &[&str],
    entity_id: impl Fn(&P) -> &str,
    order_of: impl Fn(&P) -> u32,
    build: impl Fn(&str, u32) -> P,
    column_of: impl Fn(&str) -> C,
) -> Vec<P> {
    let live: HashSet<&str> = live_ids.iter().copied().collect();
    let mut placed: HashSet<&str> = HashSet::new();
    // (column, previous order, arrival index, entity id)
    let mut slots: Vec<(C, u32, usize, &str)> = Vec::new();

    for placement in existing {
        let id = entity_id(placement);
        if live.contains(id) && placed.insert(id) {
            slots.push((column_of(id), order_of(placement), slots.len(), id));
        }
    }
    for &id in live_ids {
        if placed.insert(id) {
            slots.push((column_of(id), u32::MAX, slots.len(), id));
        }
    }

    slots.sort();
    let mut next_order: BTreeMap<C, u32> = BTreeMap::new();
    slots
        .into_iter()
        .map(|(column, _, _, id)| {
            let order = next_order.entry(column).or_insert(0);
            let placement = build(id, *order);
            *order += 1;
            placement
        })
        .collect()
}

/// Drift found between derived rows and their sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Tasks whose contract or period no longer exists.
    pub orphan_tasks: Vec<String>,
    /// `(contract_id, period_id)` pairs with no task.
    pub missing_tasks: Vec<(String, String)>,
    /// Placements pointing at missing tasks/contracts, or repeated ones.
    pub stray_placements: usize,
    /// Live tasks/contracts with no placement.
    pub missing_placements: usize,
    /// Placements in a column other than the status column.
    pub column_mismatches: usize,
    /// Columns holding repeated order values.
    pub duplicate_orders: usize,
}

impl ConsistencyReport {
    /// Whether task rows themselves are wrong and need a full rebuild.
    pub fn needs_regeneration(&self) -> bool {
        !self.orphan_tasks.is_empty() || !self.missing_tasks.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        !self.needs_regeneration()
            && self.stray_placements == 0
            && self.missing_placements == 0
            && self.column_mismatches == 0
            && self.duplicate_orders == 0
    }
}

/// Checks every derived-row invariant without changing anything.
pub fn audit(data: &StoreSnapshot) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();
    let contracts: HashMap<&str, &Contract> = data
        .contracts
        .iter()
        .map(|contract| (contract.id.as_str(), contract))
        .collect();

    let mut task_keys = HashSet::new();
    let mut task_ids = HashSet::new();
    for task in &data.tasks {
        let period_exists = contracts
            .get(task.contract_id.as_str())
            .is_some_and(|contract| contract.period(&task.maintenance_period_id).is_some());
        let repeated = !task_ids.insert(task.id.as_str());
        if !period_exists || repeated {
            report.orphan_tasks.push(task.id.clone());
        }
        task_keys.insert((task.contract_id.as_str(), task.maintenance_period_id.as_str()));
    }
    for contract in &data.contracts {
        for period in &contract.maintenance_periods {
            if !task_keys.contains(&(contract.id.as_str(), period.id.as_str())) {
                report
                    .missing_tasks
                    .push((contract.id.clone(), period.id.clone()));
            }
        }
    }

    let task_columns: HashMap<&str, TaskColumn> = data
        .tasks
        .iter()
        .map(|task| (task.id.as_str(), TaskColumn::for_status(task.status)))
        .collect();
    audit_board(
        &mut report,
        &task_columns,
        data.kanban
            .iter()
            .map(|p| (p.task_id.as_str(), p.column, p.order)),
    );

    let contract_columns: HashMap<&str, _> = data
        .contracts
        .iter()
        .map(|contract| (contract.id.as_str(), contract.status))
        .collect();
    audit_board(
        &mut report,
        &contract_columns,
        data.contract_kanban
            .iter()
            .map(|p| (p.contract_id.as_str(), p.column, p.order)),
    );

    report
}

fn audit_board<'p, C: Copy + Eq + Hash>(
    report: &mut ConsistencyReport,
    expected: &HashMap<&str, C>,
    placements: impl Iterator<Item = (&'p str, C, u32)>,
) {
    let mut seen = HashSet::new();
    let mut orders = HashSet::new();
    let mut columns_with_duplicates = HashSet::new();

    for (id, column, order) in placements {
        match expected.get(id) {
            Some(want) if seen.insert(id) => {
                if *want != column {
                    report.column_mismatches += 1;
                }
            }
            _ => report.stray_placements += 1,
        }
        if !orders.insert((column, order)) {
            columns_with_duplicates.insert(column);
        }
    }

    report.missing_placements += expected.keys().filter(|id| !seen.contains(*id)).count();
    report.duplicate_orders += columns_with_duplicates.len();
}
