use rusqlite::Connection;
use tagstore_core::db::migrations::latest_version;
use tagstore_core::db::{open_db, open_db_in_memory, DbError, Schema};

#[test]
fn open_db_in_memory_applies_record_store_migrations() {
    let conn = open_db_in_memory(Schema::RecordStore).unwrap();

    assert_eq!(schema_version(&conn), latest_version(Schema::RecordStore));
    assert_table_exists(&conn, "resources");
    assert_table_exists(&conn, "tags");
    assert_table_missing(&conn, "edges");
}

#[test]
fn open_db_in_memory_applies_index_migrations() {
    let conn = open_db_in_memory(Schema::RelationshipIndex).unwrap();

    assert_eq!(
        schema_version(&conn),
        latest_version(Schema::RelationshipIndex)
    );
    assert_table_exists(&conn, "edges");
    assert_table_missing(&conn, "resources");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tagstore.db");

    let conn_first = open_db(&path, Schema::RecordStore).unwrap();
    assert_eq!(
        schema_version(&conn_first),
        latest_version(Schema::RecordStore)
    );
    drop(conn_first);

    let conn_second = open_db(&path, Schema::RecordStore).unwrap();
    assert_eq!(
        schema_version(&conn_second),
        latest_version(Schema::RecordStore)
    );
    assert_table_exists(&conn_second, "resources");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, Schema::RecordStore).unwrap_err();
    match err {
        DbError::SchemaTooNew {
            schema,
            found,
            supported,
        } => {
            assert_eq!(schema, Schema::RecordStore);
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version(Schema::RecordStore));
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap()
}

fn tables(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    let names = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    names
}

fn assert_table_exists(conn: &Connection, table: &str) {
    let present = tables(conn);
    assert!(present.iter().any(|name| name == table), "{table} not in {present:?}");
}

fn assert_table_missing(conn: &Connection, table: &str) {
    let present = tables(conn);
    assert!(!present.iter().any(|name| name == table), "{table} unexpectedly in {present:?}");
}
