mod common;

use common::{day, memory_store, open_store, sample_contract};
use serde_json::Value;
use upkeep_core::storage::CollectionWrite;
use upkeep_core::model::contract::ContractValidationError;
use upkeep_core::{
    export_data, export_json, import_data, parse_envelope, CollectionKey, CollectionStorage,
    DataScope, HistoryManager, SqliteCollectionStorage, StoreError, TransferError,
};

#[test]
fn contracts_export_leaves_out_engineers() {
    let mut store = memory_store(day(2024, 1, 1));
    store.add_contract(sample_contract("C-1")).unwrap();

    let json: Value =
        serde_json::from_str(&export_json(&store, &[DataScope::Contracts]).unwrap()).unwrap();

    assert_eq!(json["version"], "1.0");
    assert_eq!(json["exportDate"], "2024-01-01T00:00:00Z");
    assert_eq!(json["dataTypes"], serde_json::json!(["contracts"]));
    assert_eq!(json["contracts"].as_array().unwrap().len(), 1);
    assert_eq!(json["tasks"].as_array().unwrap().len(), 2);
    assert!(json.get("contractKanban").is_some());
    assert!(json.get("maintenanceReports").is_some());
    assert!(json.get("engineers").is_none());
}

#[test]
fn export_then_full_import_reproduces_the_store() {
    let mut source = memory_store(day(2024, 1, 1));
    source.add_contract(sample_contract("C-1")).unwrap();
    let raw = serde_json::to_string(&export_data(&source, &[DataScope::All])).unwrap();

    let mut target = memory_store(day(2024, 1, 1));
    let report = import_data(&mut target, parse_envelope(&raw).unwrap(), &[DataScope::All]).unwrap();

    assert!(report.full);
    assert!(!report.regenerated);
    assert_eq!(target.snapshot(), source.snapshot());
}

#[test]
fn full_import_clears_every_key_even_when_empty() {
    let mut storage = SqliteCollectionStorage::open_in_memory().unwrap();
    storage
        .write_batch(&[
            CollectionWrite {
                key: CollectionKey::Notifications,
                payload: r#"[{"id":"n1"}]"#.to_string(),
            },
            CollectionWrite {
                key: CollectionKey::NotificationSettings,
                payload: r#"{"enabled":true}"#.to_string(),
            },
        ])
        .unwrap();
    let mut store = open_store(storage, day(2024, 1, 1));
    store.add_contract(sample_contract("C-1")).unwrap();
    let mut history = HistoryManager::open(store);
    history.checkpoint("before import").unwrap();

    let envelope = parse_envelope(r#"{"version":"1.0","contracts":[]}"#).unwrap();
    let report = history.import(envelope, &[DataScope::All]).unwrap();

    assert!(report.full);
    assert!(report.history_cleared);
    assert!(history.log().is_empty());

    let store = history.store();
    assert!(store.list_contracts(true).is_empty());
    assert!(store.engineers().is_empty());
    assert!(store.tasks().is_empty());
    assert!(store.task_board().is_empty());
    for key in [
        CollectionKey::AppHistory,
        CollectionKey::Notifications,
        CollectionKey::NotificationSettings,
    ] {
        assert!(store.storage().read(key).unwrap().is_none(), "{key} survived");
    }
    assert_eq!(
        store.storage().read(CollectionKey::Contracts).unwrap().as_deref(),
        Some("[]")
    );
}

#[test]
fn selective_engineer_import_leaves_contracts_alone() {
    let mut store = memory_store(day(2024, 1, 1));
    let contract = store.add_contract(sample_contract("C-1")).unwrap();
    let tasks_before = store.snapshot().tasks;

    let envelope = parse_envelope(
        r#"{
            "engineers": [{"id": 2, "name": "Kept"}, {"id": 10, "name": "Imported"}],
            "contracts": []
        }"#,
    )
    .unwrap();
    let report = import_data(&mut store, envelope, &[DataScope::Engineers]).unwrap();

    assert!(!report.full);
    assert_eq!(report.replaced, vec![CollectionKey::Engineers]);
    let ids: Vec<&str> = store.engineers().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "10"]);
    assert!(store.get_contract(&contract.id).is_some());
    assert_eq!(store.snapshot().tasks, tasks_before);
}

#[test]
fn requested_scope_missing_from_envelope_changes_nothing() {
    let mut store = memory_store(day(2024, 1, 1));
    store.add_contract(sample_contract("C-1")).unwrap();
    let before = store.snapshot();

    let envelope = parse_envelope(r#"{"engineers": []}"#).unwrap();
    let report = import_data(&mut store, envelope, &[DataScope::Contracts]).unwrap();

    assert!(report.replaced.is_empty());
    assert_eq!(store.snapshot(), before);
}

#[test]
fn imported_contracts_without_tasks_are_regenerated() {
    let mut store = memory_store(day(2024, 1, 1));

    let envelope = parse_envelope(
        r#"{
            "contracts": [{
                "id": "c-1",
                "contractNumber": "IMP-1",
                "clientName": "Acme",
                "objectId": "o-1",
                "startDate": "2024-01-01",
                "endDate": "2024-12-31",
                "status": "active",
                "maintenancePeriods": [
                    {"id": "p1", "startDate": "10.04.2024", "endDate": "20.04.2024"}
                ]
            }]
        }"#,
    )
    .unwrap();
    let report = import_data(&mut store, envelope, &[DataScope::Contracts]).unwrap();

    assert!(report.regenerated);
    assert_eq!(report.migrated_records, 1);
    let tasks = store.tasks_for_contract("c-1");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].scheduled_date, day(2024, 4, 15));
    assert_eq!(store.task_board().len(), 1);
    assert_eq!(store.contract_board().len(), 1);
    assert_eq!(store.engineers().len(), 3);
}

#[test]
fn invalid_envelopes_are_rejected_before_touching_the_store() {
    let mut store = memory_store(day(2024, 1, 1));
    store.add_contract(sample_contract("C-1")).unwrap();
    let before = store.snapshot();

    assert!(matches!(
        parse_envelope(r#"{"exportDate":"2024-01-01T00:00:00Z","version":"1.0"}"#),
        Err(TransferError::InvalidImportEnvelope(_))
    ));
    assert!(matches!(
        parse_envelope("not json"),
        Err(TransferError::Json(_))
    ));
    assert!(matches!(
        parse_envelope(r#"{"tasks": [{"id": "t"}]}"#),
        Err(TransferError::MalformedCollection {
            key: CollectionKey::Tasks,
            ..
        })
    ));
    assert_eq!(store.snapshot(), before);
}

fn contract_json(id: &str, number: &str, status: &str, periods: &str) -> String {
    format!(
        r#"{{"id": "{id}", "contractNumber": "{number}", "clientName": "Acme",
            "objectId": "o-1", "startDate": "2024-01-01", "endDate": "2024-12-31",
            "status": "{status}", "assignedEngineerIds": ["2"],
            "maintenancePeriods": {periods}}}"#
    )
}

#[test]
fn imported_contracts_with_a_shared_number_are_rejected() {
    let mut store = memory_store(day(2024, 1, 1));
    store.add_contract(sample_contract("C-1")).unwrap();
    let before = store.snapshot();

    let raw = format!(
        r#"{{"contracts": [{}, {}]}}"#,
        contract_json("a", " DUP ", "active", "[]"),
        contract_json("b", "DUP", "active", "[]")
    );
    let err = import_data(&mut store, parse_envelope(&raw).unwrap(), &[DataScope::Contracts])
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::Store(StoreError::DuplicateKey { ref contract_number, ref existing_id })
            if contract_number == "DUP" && existing_id == "a"
    ));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn archived_duplicates_are_admitted_and_numbers_are_trimmed() {
    let mut store = memory_store(day(2024, 1, 1));

    let raw = format!(
        r#"{{"contracts": [{}, {}]}}"#,
        contract_json("a", " DUP ", "active", "[]"),
        contract_json("b", "DUP", "archived", "[]")
    );
    import_data(&mut store, parse_envelope(&raw).unwrap(), &[DataScope::Contracts]).unwrap();

    assert_eq!(store.get_contract("a").unwrap().contract_number, "DUP");
    assert_eq!(store.list_contracts(true).len(), 2);
}

#[test]
fn imported_contract_with_inverted_dates_is_rejected() {
    let mut store = memory_store(day(2024, 1, 1));
    let before = store.snapshot();

    let raw = r#"{"contracts": [{"id": "a", "contractNumber": "X", "clientName": "Acme",
        "objectId": "o-1", "startDate": "2024-12-31", "endDate": "2024-01-01",
        "status": "active"}]}"#;
    let err = import_data(&mut store, parse_envelope(raw).unwrap(), &[DataScope::All])
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::Store(StoreError::Validation(
            ContractValidationError::InvalidDateRange { .. }
        ))
    ));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn imported_contract_with_repeated_period_ids_is_rejected() {
    let mut store = memory_store(day(2024, 1, 1));
    let before = store.snapshot();

    let periods = r#"[
        {"id": "p1", "startDate": "2024-03-01", "endDate": "2024-03-15"},
        {"id": "p1", "startDate": "2024-06-01", "endDate": "2024-06-15"}
    ]"#;
    let raw = format!(
        r#"{{"contracts": [{}]}}"#,
        contract_json("a", "X", "active", periods)
    );
    let err = import_data(&mut store, parse_envelope(&raw).unwrap(), &[DataScope::Contracts])
        .unwrap_err();

    assert!(matches!(
        err,
        TransferError::Store(StoreError::Validation(
            ContractValidationError::DuplicatePeriodId(ref id)
        )) if id == "p1"
    ));
    assert_eq!(store.snapshot(), before);
    assert!(store.tasks().is_empty());
}

#[test]
fn engineer_import_cannot_drop_an_assigned_engineer() {
    let mut store = memory_store(day(2024, 1, 1));
    let contract = store.add_contract(sample_contract("C-1")).unwrap();
    let before = store.snapshot();

    let envelope = parse_envelope(r#"{"engineers": [{"id": "10", "name": "Only"}]}"#).unwrap();
    let err = import_data(&mut store, envelope, &[DataScope::Engineers]).unwrap_err();

    match err {
        TransferError::Store(StoreError::ReferentialConstraint {
            engineer_id,
            contract_ids,
        }) => {
            assert_eq!(engineer_id, "2");
            assert_eq!(contract_ids, vec![contract.id.clone()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.snapshot(), before);
}

#[test]
fn full_import_may_drop_engineers_its_contracts_do_not_assign() {
    let mut store = memory_store(day(2024, 1, 1));
    store.add_contract(sample_contract("C-1")).unwrap();

    let raw = format!(
        r#"{{"engineers": [{{"id": "2", "name": "Kept"}}], "contracts": [{}]}}"#,
        contract_json("a", "NEW-1", "active", "[]")
    );
    let report = import_data(&mut store, parse_envelope(&raw).unwrap(), &[DataScope::All]).unwrap();

    assert!(report.full);
    assert_eq!(store.engineers().len(), 1);
    assert!(store.get_contract("a").is_some());
}

#[test]
fn envelope_record_that_fails_decoding_rejects_the_collection() {
    let raw = format!(
        r#"{{"contracts": [{}, {{"id": "b", "startDate": "someday"}}]}}"#,
        contract_json("a", "X", "active", "[]")
    );

    match parse_envelope(&raw).unwrap_err() {
        TransferError::MalformedCollection { key, message } => {
            assert_eq!(key, CollectionKey::Contracts);
            assert!(message.starts_with("record 1:"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn null_fields_in_envelope_records_take_defaults() {
    let raw = r#"{"contracts": [{"id": "a", "contractNumber": "X", "clientName": "Acme",
        "objectId": "o-1", "startDate": "2024-01-01", "endDate": "2024-12-31",
        "status": "active", "equipmentType": null, "workTypes": null}]}"#;
    let mut store = memory_store(day(2024, 1, 1));
    import_data(&mut store, parse_envelope(raw).unwrap(), &[DataScope::Contracts]).unwrap();

    let contract = store.get_contract("a").unwrap();
    assert!(contract.equipment_type.is_empty());
    assert!(contract.work_types.is_empty());
}
