//! Contract operations.

use super::{EntityKind, EntityStore, StoreError, StoreResult, CONTRACT_KEYS};
use crate::derivation::sync_kanban;
use crate::model::contract::{Contract, ContractPatch, ContractStatus, NewContract};
use crate::model::kanban::{ContractPlacement, TaskPlacement};
use crate::model::new_record_id;
use crate::model::task::MaintenanceTask;
use crate::storage::CollectionStorage;
use log::{info, warn};

impl<S: CollectionStorage> EntityStore<S> {
    /// Creates a contract and its derived tasks.
    ///
    /// # Errors
    /// - `DuplicateKey` when a non-archived contract has the same number.
    /// - `Validation` for bad date ranges or repeated period ids.
    pub fn add_contract(&mut self, input: NewContract) -> StoreResult<Contract> {
        let mut contract = input.into_contract(new_record_id());
        contract.normalize();
        contract.validate()?;

        let created = self.commit("add_contract", &CONTRACT_KEYS, |data, engine| {
            if !contract.is_archived() {
                ensure_number_available(&data.contracts, &contract.contract_number, None)?;
            }
            let id = contract.id.clone();
            data.contracts.push(contract.clone());
            engine.regenerate_contract(data, &id);
            Ok(contract)
        });

        match &created {
            Ok(contract) => info!(
                "event=contract_add module=store status=ok contract_id={} periods={}",
                contract.id,
                contract.maintenance_periods.len()
            ),
            Err(err) => warn!("event=contract_add module=store status=rejected error={err}"),
        }
        created
    }

    /// Merge-patches a contract.
    ///
    /// Changing periods, engineers, work types or the object regenerates the
    /// contract's tasks wholesale before the write completes.
    pub fn update_contract(&mut self, id: &str, patch: ContractPatch) -> StoreResult<Contract> {
        let regenerate = patch.touches_derivation();

        let updated = self.commit("update_contract", &CONTRACT_KEYS, |data, engine| {
            let index = contract_index(&data.contracts, id)?;
            let current = &data.contracts[index];
            let number_changed = patch
                .contract_number
                .as_ref()
                .is_some_and(|number| number.trim() != current.contract_number);
            let leaves_archive = current.is_archived()
                && patch
                    .status
                    .is_some_and(|status| status != ContractStatus::Archived);

            let mut updated = current.clone();
            patch.apply(&mut updated);
            updated.normalize();
            updated.validate()?;

            if !updated.is_archived() && (number_changed || leaves_archive) {
                ensure_number_available(&data.contracts, &updated.contract_number, Some(id))?;
            }

            data.contracts[index] = updated.clone();
            if regenerate {
                engine.regenerate_contract(data, id);
            } else {
                sync_kanban(data);
            }
            Ok(updated)
        });

        match &updated {
            Ok(_) => info!(
                "event=contract_update module=store status=ok contract_id={id} regenerated={regenerate}"
            ),
            Err(err) => warn!(
                "event=contract_update module=store status=rejected contract_id={id} error={err}"
            ),
        }
        updated
    }

    /// Soft-deletes a contract; its board placement moves to `archived`.
    pub fn archive_contract(&mut self, id: &str) -> StoreResult<Contract> {
        let archived = self.commit("archive_contract", &CONTRACT_KEYS, |data, _| {
            let index = contract_index(&data.contracts, id)?;
            data.contracts[index].status = ContractStatus::Archived;
            sync_kanban(data);
            Ok(data.contracts[index].clone())
        })?;

        info!("event=contract_archive module=store status=ok contract_id={id}");
        Ok(archived)
    }

    pub fn get_contract(&self, id: &str) -> Option<&Contract> {
        self.data.contracts.iter().find(|contract| contract.id == id)
    }

    /// Lists contracts in insertion order.
    pub fn list_contracts(&self, include_archived: bool) -> Vec<&Contract> {
        self.data
            .contracts
            .iter()
            .filter(|contract| include_archived || !contract.is_archived())
            .collect()
    }

    pub fn tasks_for_contract(&self, contract_id: &str) -> Vec<&MaintenanceTask> {
        self.data
            .tasks
            .iter()
            .filter(|task| task.contract_id == contract_id)
            .collect()
    }

    pub fn tasks(&self) -> &[MaintenanceTask] {
        &self.data.tasks
    }

    /// Task board placements, grouped by column and ordered within it.
    pub fn task_board(&self) -> &[TaskPlacement] {
        &self.data.kanban
    }

    /// Contract board placements, grouped by column and ordered within it.
    pub fn contract_board(&self) -> &[ContractPlacement] {
        &self.data.contract_kanban
    }
}

fn contract_index(contracts: &[Contract], id: &str) -> StoreResult<usize> {
    contracts
        .iter()
        .position(|contract| contract.id == id)
        .ok_or_else(|| StoreError::NotFound {
            entity: EntityKind::Contract,
            id: id.to_string(),
        })
}

fn ensure_number_available(
    contracts: &[Contract],
    number: &str,
    except_id: Option<&str>,
) -> StoreResult<()> {
    let clash = contracts.iter().find(|contract| {
        !contract.is_archived()
            && Some(contract.id.as_str()) != except_id
            && contract.contract_number == number
    });
    match clash {
        Some(existing) => Err(StoreError::DuplicateKey {
            contract_number: number.to_string(),
            existing_id: existing.id.clone(),
        }),
        None => Ok(()),
    }
}

/// Normalizes and validates a whole incoming contract set.
///
/// # Errors
/// - `Validation` for the first contract that fails its own checks.
/// - `DuplicateKey` when two non-archived contracts share a number.
pub(crate) fn admit_contracts(contracts: &mut [Contract]) -> StoreResult<()> {
    for contract in contracts.iter_mut() {
        contract.normalize();
        contract.validate()?;
    }
    for (index, contract) in contracts.iter().enumerate() {
        if !contract.is_archived() {
            ensure_number_available(&contracts[..index], &contract.contract_number, None)?;
        }
    }
    Ok(())
}
