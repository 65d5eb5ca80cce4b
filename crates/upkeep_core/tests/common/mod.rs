#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::Cell;
use upkeep_core::storage::{CollectionWrite, StorageResult};
use upkeep_core::{
    CollectionKey, CollectionStorage, EntityStore, FixedClock, MaintenancePeriod, NewContract,
    SqliteCollectionStorage, StorageError, StoreConfig,
};

pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn open_store(
    storage: SqliteCollectionStorage,
    today: NaiveDate,
) -> EntityStore<SqliteCollectionStorage> {
    let (store, _) =
        EntityStore::open(storage, StoreConfig::default(), Box::new(FixedClock::on(today)))
            .unwrap();
    store
}

pub fn memory_store(today: NaiveDate) -> EntityStore<SqliteCollectionStorage> {
    open_store(SqliteCollectionStorage::open_in_memory().unwrap(), today)
}

pub fn period(id: &str, start: NaiveDate, end: NaiveDate) -> MaintenancePeriod {
    let mut period = MaintenancePeriod::new(start, end);
    period.id = id.to_string();
    period
}

/// Contract for 2024 with two quarterly windows and one assigned engineer.
pub fn sample_contract(number: &str) -> NewContract {
    let mut contract = NewContract::new(number, "Acme", "object-1", day(2024, 1, 1), day(2024, 12, 31));
    contract.maintenance_periods = vec![
        period("p1", day(2024, 3, 1), day(2024, 3, 15)),
        period("p2", day(2024, 6, 1), day(2024, 6, 15)),
    ];
    contract.assigned_engineer_ids = vec!["2".to_string()];
    contract.work_types = vec!["КОНД".to_string(), "ДБЖ".to_string()];
    contract
}

/// Storage wrapper whose writes can be made to fail on demand.
pub struct FlakyStorage {
    inner: SqliteCollectionStorage,
    fail_writes: Cell<bool>,
}

impl FlakyStorage {
    pub fn new(inner: SqliteCollectionStorage) -> Self {
        Self {
            inner,
            fail_writes: Cell::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_writes.get() {
            return Err(StorageError::Rejected("injected failure".to_string()));
        }
        Ok(())
    }
}

impl CollectionStorage for FlakyStorage {
    fn read(&self, key: CollectionKey) -> StorageResult<Option<String>> {
        self.inner.read(key)
    }

    fn write_batch(&mut self, writes: &[CollectionWrite]) -> StorageResult<()> {
        self.check()?;
        self.inner.write_batch(writes)
    }

    fn remove(&mut self, key: CollectionKey) -> StorageResult<()> {
        self.check()?;
        self.inner.remove(key)
    }

    fn replace_all(&mut self, writes: &[CollectionWrite]) -> StorageResult<()> {
        self.check()?;
        self.inner.replace_all(writes)
    }

    fn stored_keys(&self) -> StorageResult<Vec<CollectionKey>> {
        self.inner.stored_keys()
    }
}
