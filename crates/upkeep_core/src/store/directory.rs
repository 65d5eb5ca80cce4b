//! Engineer, object and report operations.

use super::{EntityKind, EntityStore, StoreError, StoreResult};
use crate::model::contract::{Contract, ContractStatus};
use crate::model::engineer::{EngineerPatch, NewEngineer, ServiceEngineer};
use crate::model::new_record_id;
use crate::model::object::{NewObject, ObjectPatch, ObjectStatus, ServiceObject};
use crate::model::report::{MaintenanceReport, NewReport};
use crate::storage::{CollectionKey, CollectionStorage};
use log::{info, warn};

impl<S: CollectionStorage> EntityStore<S> {
    pub fn add_engineer(&mut self, input: NewEngineer) -> StoreResult<ServiceEngineer> {
        let name = required_text(input.name, "engineer name")?;
        let engineer = ServiceEngineer {
            id: new_record_id(),
            name,
            phone: input.phone,
            email: input.email,
            specialization: input.specialization,
        };

        self.commit("add_engineer", &[CollectionKey::Engineers], |data, _| {
            data.engineers.push(engineer.clone());
            Ok(engineer)
        })
    }

    pub fn update_engineer(
        &mut self,
        id: &str,
        mut patch: EngineerPatch,
    ) -> StoreResult<ServiceEngineer> {
        if let Some(name) = patch.name.take() {
            patch.name = Some(required_text(name, "engineer name")?);
        }

        self.commit("update_engineer", &[CollectionKey::Engineers], |data, _| {
            let engineer = data
                .engineers
                .iter_mut()
                .find(|engineer| engineer.id == id)
                .ok_or_else(|| not_found(EntityKind::Engineer, id))?;
            patch.apply(engineer);
            Ok(engineer.clone())
        })
    }

    /// Hard-deletes an engineer.
    ///
    /// # Errors
    /// - `ReferentialConstraint` while any active contract assigns them.
    /// - `NotFound` for an unknown id.
    pub fn delete_engineer(&mut self, id: &str) -> StoreResult<()> {
        let blocking = active_assignments(&self.data.contracts, id);
        if !blocking.is_empty() {
            warn!(
                "event=engineer_delete module=store status=rejected engineer_id={id} blocking_contracts={}",
                blocking.len()
            );
            return Err(StoreError::ReferentialConstraint {
                engineer_id: id.to_string(),
                contract_ids: blocking,
            });
        }

        self.commit("delete_engineer", &[CollectionKey::Engineers], |data, _| {
            let before = data.engineers.len();
            data.engineers.retain(|engineer| engineer.id != id);
            if data.engineers.len() == before {
                return Err(not_found(EntityKind::Engineer, id));
            }
            Ok(())
        })?;

        info!("event=engineer_delete module=store status=ok engineer_id={id}");
        Ok(())
    }

    pub fn get_engineer(&self, id: &str) -> Option<&ServiceEngineer> {
        self.data.engineers.iter().find(|engineer| engineer.id == id)
    }

    pub fn engineers(&self) -> &[ServiceEngineer] {
        &self.data.engineers
    }

    pub fn add_object(&mut self, input: NewObject) -> StoreResult<ServiceObject> {
        let object = ServiceObject {
            id: new_record_id(),
            name: required_text(input.name, "object name")?,
            address: input.address,
            client_name: input.client_name,
            status: ObjectStatus::Active,
        };

        self.commit("add_object", &[CollectionKey::Objects], |data, _| {
            data.objects.push(object.clone());
            Ok(object)
        })
    }

    pub fn update_object(&mut self, id: &str, patch: ObjectPatch) -> StoreResult<ServiceObject> {
        self.commit("update_object", &[CollectionKey::Objects], |data, _| {
            let object = data
                .objects
                .iter_mut()
                .find(|object| object.id == id)
                .ok_or_else(|| not_found(EntityKind::Object, id))?;
            patch.apply(object);
            Ok(object.clone())
        })
    }

    /// Soft-deletes an object.
    pub fn archive_object(&mut self, id: &str) -> StoreResult<ServiceObject> {
        self.update_object(
            id,
            ObjectPatch {
                status: Some(ObjectStatus::Archived),
                ..ObjectPatch::default()
            },
        )
    }

    pub fn get_object(&self, id: &str) -> Option<&ServiceObject> {
        self.data.objects.iter().find(|object| object.id == id)
    }

    pub fn list_objects(&self, include_archived: bool) -> Vec<&ServiceObject> {
        self.data
            .objects
            .iter()
            .filter(|object| include_archived || object.status != ObjectStatus::Archived)
            .collect()
    }

    /// Files a report. A report naming a task closes that task out, which
    /// regenerates the contract's tasks.
    pub fn add_report(&mut self, input: NewReport) -> StoreResult<MaintenanceReport> {
        if self.get_contract(&input.contract_id).is_none() {
            return Err(not_found(EntityKind::Contract, &input.contract_id));
        }
        if let Some(task_id) = input.task_id.as_deref() {
            let belongs = self
                .data
                .tasks
                .iter()
                .any(|task| task.id == task_id && task.contract_id == input.contract_id);
            if !belongs {
                return Err(not_found(EntityKind::Task, task_id));
            }
        }

        let report = MaintenanceReport {
            id: new_record_id(),
            contract_id: input.contract_id,
            task_id: input.task_id,
            engineer_id: input.engineer_id,
            date: input.date,
            work_performed: input.work_performed,
            notes: input.notes,
        };
        let closes_task = report.task_id.is_some();

        let keys = [
            CollectionKey::MaintenanceReports,
            CollectionKey::Tasks,
            CollectionKey::Kanban,
            CollectionKey::ContractKanban,
        ];
        let filed = self.commit("add_report", &keys, |data, engine| {
            data.maintenance_reports.push(report.clone());
            if closes_task {
                engine.regenerate_contract(data, &report.contract_id);
            }
            Ok(report)
        })?;

        info!(
            "event=report_add module=store status=ok contract_id={} closes_task={closes_task}",
            filed.contract_id
        );
        Ok(filed)
    }

    pub fn reports_for_contract(&self, contract_id: &str) -> Vec<&MaintenanceReport> {
        self.data
            .maintenance_reports
            .iter()
            .filter(|report| report.contract_id == contract_id)
            .collect()
    }
}

fn not_found(entity: EntityKind, id: &str) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn required_text(value: String, field: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

/// Ids of active contracts that assign `engineer_id`.
pub(crate) fn active_assignments(contracts: &[Contract], engineer_id: &str) -> Vec<String> {
    contracts
        .iter()
        .filter(|contract| {
            contract.status == ContractStatus::Active
                && contract.assigned_engineer_ids.iter().any(|e| e == engineer_id)
        })
        .map(|contract| contract.id.clone())
        .collect()
}
