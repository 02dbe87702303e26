//! Tests for the SQLite connection wrapper

use crate::connection::{SqliteConnection, value_to_rusqlite};
use schemata_core::{
    CancellationToken, Connection, ConnectionConfig, SchemataError, SqlExecutor, Transaction,
    Value, cancellation,
};

fn memory() -> SqliteConnection {
    SqliteConnection::open(":memory:").unwrap()
}

#[test]
fn test_value_to_rusqlite_scalars() {
    use rusqlite::types::Value as Sql;

    assert_eq!(value_to_rusqlite(&Value::Null), Sql::Null);
    assert_eq!(value_to_rusqlite(&Value::Bool(true)), Sql::Integer(1));
    assert_eq!(value_to_rusqlite(&Value::Int32(7)), Sql::Integer(7));
    assert_eq!(
        value_to_rusqlite(&Value::Decimal("12.50".into())),
        Sql::Text("12.50".into())
    );
    assert_eq!(
        value_to_rusqlite(&Value::Bytes(vec![1, 2])),
        Sql::Blob(vec![1, 2])
    );
}

#[test]
fn test_value_to_rusqlite_array_is_json_text() {
    use rusqlite::types::Value as Sql;

    let value = Value::Array(vec![Value::Int64(1), Value::Null, Value::Bool(false)]);
    assert_eq!(value_to_rusqlite(&value), Sql::Text("[\"1\",null,false]".into()));
}

#[tokio::test]
async fn test_execute_and_query_with_params() {
    let conn = memory();
    conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await
        .unwrap();
    let inserted = conn
        .execute(
            "INSERT INTO t (name) VALUES (?1), (?2)",
            &[Value::from("a"), Value::from("b")],
        )
        .await
        .unwrap();
    assert_eq!(inserted.affected_rows, 2);

    let result = conn
        .query("SELECT id, name FROM t WHERE name = ?1", &[Value::from("b")])
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.columns[1].name, "name");
    assert_eq!(result.columns[1].data_type, "TEXT");
    assert_eq!(result.rows[0].int("id"), Some(2));
    assert_eq!(result.rows[0].text("name").as_deref(), Some("b"));
}

#[tokio::test]
async fn test_pragma_with_result_runs_through_execute() {
    let conn = memory();
    let result = conn.execute("PRAGMA foreign_keys", &[]).await.unwrap();
    assert_eq!(result.affected_rows, 0);

    let enabled = conn.query("PRAGMA foreign_keys", &[]).await.unwrap();
    assert_eq!(enabled.scalar().and_then(Value::as_bool), Some(true));
}

#[tokio::test]
async fn test_connect_defaults_to_memory() {
    let conn = SqliteConnection::connect(&ConnectionConfig::new("sqlite")).unwrap();
    let result = conn.query("SELECT 1 AS one", &[]).await.unwrap();
    assert_eq!(result.rows[0].int("one"), Some(1));
}

#[tokio::test]
async fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schemata.db");
    let path = path.to_string_lossy().to_string();

    {
        let conn = SqliteConnection::open(&path).unwrap();
        conn.execute("CREATE TABLE kept (id INTEGER)", &[]).await.unwrap();
        conn.close().await.unwrap();
    }

    let conn = SqliteConnection::open(&path).unwrap();
    let result = conn
        .query("SELECT name FROM sqlite_master WHERE type = 'table'", &[])
        .await
        .unwrap();
    assert_eq!(result.rows[0].text("name").as_deref(), Some("kept"));
}

#[test]
fn test_missing_parent_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("db.sqlite");
    let err = SqliteConnection::open(&path.to_string_lossy()).err().unwrap();
    assert!(matches!(err, SchemataError::Connection(_)));
}

#[tokio::test]
async fn test_closed_connection_rejects_statements() {
    let conn = memory();
    conn.close().await.unwrap();
    assert!(conn.is_closed());
    let err = conn.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, SchemataError::Connection(_)));
}

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let conn = memory();
    conn.execute("CREATE TABLE t (v INTEGER)", &[]).await.unwrap();

    let tx = conn.begin_transaction().await.unwrap();
    tx.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
    tx.rollback().await.unwrap();

    let tx = conn.begin_transaction().await.unwrap();
    tx.execute("INSERT INTO t VALUES (2)", &[]).await.unwrap();
    tx.commit().await.unwrap();

    let result = conn.query("SELECT v FROM t", &[]).await.unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].int("v"), Some(2));
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let conn = memory();
    conn.execute("CREATE TABLE t (v INTEGER)", &[]).await.unwrap();
    {
        let tx = conn.begin_transaction().await.unwrap();
        tx.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
    }
    let result = conn.query("SELECT count(*) AS n FROM t", &[]).await.unwrap();
    assert_eq!(result.rows[0].int("n"), Some(0));
}

#[tokio::test]
async fn test_cancelled_token_stops_before_execution() {
    let conn = memory();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = cancellation::execute(&conn, "CREATE TABLE never (id INTEGER)", &[], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SchemataError::Cancelled));

    let result = conn
        .query("SELECT count(*) AS n FROM sqlite_master", &[])
        .await
        .unwrap();
    assert_eq!(result.rows[0].int("n"), Some(0));
}
