use rusqlite::Connection;
use upkeep_core::db::migrations::latest_version;
use upkeep_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert!(column_names(&conn, "collections").contains(&"revision".to_string()));
    assert!(column_names(&conn, "collections").contains(&"updated_at".to_string()));
}

#[test]
fn reopening_a_store_file_keeps_its_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upkeep.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO collections (key, payload) VALUES ('engineers', '[]');",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let payload: String = conn
        .query_row(
            "SELECT payload FROM collections WHERE key = 'engineers';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(payload, "[]");
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::SchemaTooNew { found, supported } => {
            assert_eq!(found, 42);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
