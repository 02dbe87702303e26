//! A cancelled token stops schema operations before they reach the server

use crate::fixtures::{TestDialect, schema_driver, test_database};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rstest::rstest;
use schemata_core::model::{Column, Table};
use schemata_core::{
    ColumnMethods, DialectSchema, HostType, QueryResult, SchemataError, SqlExecutor, StatementResult,
    TableAlteration, TableMethods, Value,
};
use schemata_drivers::CancellationToken;

/// Records every statement instead of running it
#[derive(Default)]
struct RecordingExecutor {
    issued: Mutex<Vec<String>>,
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    fn driver_name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> schemata_core::Result<StatementResult> {
        self.issued.lock().push(sql.to_string());
        Ok(StatementResult { affected_rows: 0 })
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> schemata_core::Result<QueryResult> {
        self.issued.lock().push(sql.to_string());
        Ok(QueryResult::empty())
    }
}

fn widgets() -> Result<Table> {
    Ok(Table::with_columns(
        "widgets",
        [
            Column::new("id", HostType::I64).primary_key(),
            Column::new("label", HostType::String).with_length(50),
        ],
    )?)
}

fn cancelled() -> CancellationToken {
    let cancel = CancellationToken::new();
    cancel.cancel();
    cancel
}

#[rstest]
#[case::sqlite(TestDialect::Sqlite)]
#[case::postgres(TestDialect::Postgres)]
#[case::mysql(TestDialect::Mysql)]
#[case::mssql(TestDialect::Mssql)]
#[tokio::test]
async fn test_cancelled_operations_issue_no_sql(#[case] dialect: TestDialect) -> Result<()> {
    let driver = schema_driver(dialect)?;
    let db = RecordingExecutor::default();
    let cancel = cancelled();
    let table = widgets()?;

    let err = driver
        .create_table_if_not_exists(&db, &table, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "{:?}", err);

    let err = driver
        .drop_table_if_exists(&db, None, "widgets", &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "{:?}", err);

    let note = Column::new("note", HostType::String)
        .nullable()
        .in_table(None, "widgets");
    let err = driver
        .alter_table(&db, &table, TableAlteration::AddColumn(note.clone()), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SchemataError::Cancelled), "{:?}", err);

    let err = driver
        .create_column_if_not_exists(&db, &note, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "{:?}", err);

    assert!(db.issued.lock().is_empty(), "{:?}", db.issued.lock());
    Ok(())
}

#[tokio::test]
async fn test_cancelled_create_leaves_no_table_behind() -> Result<()> {
    let Some(db) = test_database(TestDialect::Sqlite).await? else {
        return Ok(());
    };
    let table = widgets()?;

    let err = db
        .driver
        .create_table_if_not_exists(db.db(), &table, &cancelled())
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    assert!(
        !db.driver
            .table_exists(db.db(), None, "widgets", &db.cancel)
            .await?
    );
    assert!(
        db.driver
            .create_table_if_not_exists(db.db(), &table, &db.cancel)
            .await?
    );
    Ok(())
}
