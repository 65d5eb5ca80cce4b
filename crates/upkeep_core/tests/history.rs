mod common;

use common::{day, memory_store, open_store, sample_contract, FlakyStorage};
use upkeep_core::model::engineer::NewEngineer;
use upkeep_core::{
    CollectionKey, CollectionStorage, EntityStore, FixedClock, HistoryError, HistoryManager,
    SaveOutcome, SqliteCollectionStorage, StoreConfig,
};

#[test]
fn identical_checkpoints_are_recorded_once() {
    let mut history = HistoryManager::open(memory_store(day(2024, 1, 1)));

    assert!(matches!(
        history.checkpoint("initial").unwrap(),
        SaveOutcome::Saved { .. }
    ));
    assert_eq!(history.checkpoint("again").unwrap(), SaveOutcome::Unchanged);

    let explicit = history.store().snapshot();
    assert_eq!(
        history.save_state(explicit, "explicit copy").unwrap(),
        SaveOutcome::Unchanged
    );
    assert_eq!(history.log().len(), 1);
}

#[test]
fn blank_description_is_refused() {
    let mut history = HistoryManager::open(memory_store(day(2024, 1, 1)));

    assert!(matches!(
        history.checkpoint("   "),
        Err(HistoryError::EmptyDescription)
    ));
    assert!(history.log().is_empty());
}

#[test]
fn undo_and_redo_restore_the_store() {
    let mut history = HistoryManager::open(memory_store(day(2024, 1, 1)));
    history.checkpoint("empty").unwrap();
    history
        .store_mut()
        .add_contract(sample_contract("C-1"))
        .unwrap();
    history.checkpoint("one contract").unwrap();
    history
        .store_mut()
        .add_contract(sample_contract("C-2"))
        .unwrap();
    history.checkpoint("two contracts").unwrap();

    let entry = history.undo().unwrap().unwrap();
    assert_eq!(entry.description, "one contract");
    assert_eq!(history.store().list_contracts(true).len(), 1);
    assert_eq!(history.store().tasks().len(), 2);

    history.undo().unwrap();
    assert!(history.store().list_contracts(true).is_empty());
    assert!(history.store().tasks().is_empty());
    assert!(history.undo().unwrap().is_none());

    history.redo().unwrap();
    history.redo().unwrap();
    assert_eq!(history.store().list_contracts(true).len(), 2);
    assert!(history.redo().unwrap().is_none());

    let persisted = history
        .store()
        .storage()
        .read(CollectionKey::Contracts)
        .unwrap()
        .unwrap();
    assert_eq!(
        serde_json::from_str::<Vec<upkeep_core::Contract>>(&persisted).unwrap(),
        history.store().data().contracts
    );
}

#[test]
fn saving_after_undo_discards_the_redo_branch() {
    let mut history = HistoryManager::open(memory_store(day(2024, 1, 1)));
    history.checkpoint("start").unwrap();
    history
        .store_mut()
        .add_engineer(NewEngineer::named("Anna"))
        .unwrap();
    history.checkpoint("anna").unwrap();

    history.undo().unwrap();
    history
        .store_mut()
        .add_engineer(NewEngineer::named("Boris"))
        .unwrap();
    history.checkpoint("boris").unwrap();

    let descriptions: Vec<&str> = history
        .log()
        .entries()
        .iter()
        .map(|entry| entry.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["start", "boris"]);
    assert!(!history.log().can_redo());
}

#[test]
fn log_is_capped_at_configured_capacity() {
    let mut history = HistoryManager::open(memory_store(day(2024, 1, 1)));

    for i in 0..25 {
        history
            .store_mut()
            .add_engineer(NewEngineer::named(format!("engineer {i}")))
            .unwrap();
        history.checkpoint(&format!("step {i}")).unwrap();
    }

    assert_eq!(history.log().len(), 20);
    assert_eq!(history.log().entries()[0].description, "step 5");
    assert_eq!(history.log().current_index(), Some(19));
}

#[test]
fn long_descriptions_are_truncated() {
    let mut history = HistoryManager::open(memory_store(day(2024, 1, 1)));
    history.checkpoint(&"x".repeat(500)).unwrap();

    assert_eq!(
        history.log().current().unwrap().description.chars().count(),
        200
    );
}

#[test]
fn log_survives_reopen() {
    let mut history = HistoryManager::open(memory_store(day(2024, 1, 1)));
    history.checkpoint("start").unwrap();
    history
        .store_mut()
        .add_contract(sample_contract("C-1"))
        .unwrap();
    history.checkpoint("contract").unwrap();
    history.undo().unwrap();

    let storage = history.into_store().close();
    let reopened = HistoryManager::open(open_store(storage, day(2024, 1, 1)));

    assert_eq!(reopened.log().len(), 2);
    assert_eq!(reopened.log().current_index(), Some(0));
    assert!(reopened.store().list_contracts(true).is_empty());
}

#[test]
fn corrupt_log_starts_empty_and_is_dropped() {
    let mut storage = SqliteCollectionStorage::open_in_memory().unwrap();
    storage
        .write_batch(&[upkeep_core::storage::CollectionWrite {
            key: CollectionKey::AppHistory,
            payload: "{broken".to_string(),
        }])
        .unwrap();

    let history = HistoryManager::open(open_store(storage, day(2024, 1, 1)));

    assert!(history.log().is_empty());
    assert!(history
        .store()
        .storage()
        .read(CollectionKey::AppHistory)
        .unwrap()
        .is_none());
}

#[test]
fn failed_log_write_leaves_history_unchanged() {
    let storage = FlakyStorage::new(SqliteCollectionStorage::open_in_memory().unwrap());
    let (store, _) = EntityStore::open(
        storage,
        StoreConfig::default(),
        Box::new(FixedClock::on(day(2024, 1, 1))),
    )
    .unwrap();
    let mut history = HistoryManager::open(store);
    history.checkpoint("start").unwrap();
    history
        .store_mut()
        .add_engineer(NewEngineer::named("Anna"))
        .unwrap();

    history.store().storage().fail_writes(true);
    assert!(matches!(
        history.checkpoint("anna"),
        Err(HistoryError::Persist(_))
    ));
    assert_eq!(history.log().len(), 1);

    history.store().storage().fail_writes(false);
    history.checkpoint("anna").unwrap();
    history.store().storage().fail_writes(true);
    assert!(history.undo().is_err());
    assert_eq!(history.log().current_index(), Some(1));
    assert_eq!(history.store().engineers().len(), 4);
}
