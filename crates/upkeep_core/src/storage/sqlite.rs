//! SQLite-backed collection storage.

use super::{CollectionKey, CollectionStorage, CollectionWrite, StorageResult};
use crate::db::{open_db, open_db_in_memory, DbResult};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;

/// Stores each collection as one row in the `collections` table.
pub struct SqliteCollectionStorage {
    conn: Connection,
}

impl SqliteCollectionStorage {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens a store file, creating and migrating it when needed.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Number of successful writes recorded for `key`; 0 when absent.
    pub fn revision(&self, key: CollectionKey) -> StorageResult<i64> {
        let revision = self
            .conn
            .query_row(
                "SELECT revision FROM collections WHERE key = ?1;",
                [key.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(revision.unwrap_or(0))
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl CollectionStorage for SqliteCollectionStorage {
    fn read(&self, key: CollectionKey) -> StorageResult<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM collections WHERE key = ?1;",
                [key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write_batch(&mut self, writes: &[CollectionWrite]) -> StorageResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        upsert_all(&tx, writes)?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, key: CollectionKey) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM collections WHERE key = ?1;", [key.as_str()])?;
        Ok(())
    }

    fn replace_all(&mut self, writes: &[CollectionWrite]) -> StorageResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM collections;", [])?;
        upsert_all(&tx, writes)?;
        tx.commit()?;
        Ok(())
    }

    fn stored_keys(&self) -> StorageResult<Vec<CollectionKey>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM collections ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            match CollectionKey::parse(&raw) {
                Some(key) => keys.push(key),
                None => warn!("event=storage_keys module=storage status=skip unknown_key={raw}"),
            }
        }
        Ok(keys)
    }
}

fn upsert_all(tx: &Transaction<'_>, writes: &[CollectionWrite]) -> StorageResult<()> {
    for write in writes {
        tx.execute(
            "INSERT INTO collections (key, payload, updated_at, revision)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000), 1)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at,
                revision = collections.revision + 1;",
            params![write.key.as_str(), write.payload.as_str()],
        )?;
    }
    Ok(())
}
