#![cfg(feature = "sqlite")]

//! Dispatch from a live connection to its schema driver

use pretty_assertions::assert_eq;
use schemata_core::model::{Column, Table};
use schemata_core::{DialectSchema, HostType, TableMethods};
use schemata_drivers::sqlite::SqliteConnection;
use schemata_drivers::{CancellationToken, Dialect, SchemaDriverRegistry};

#[tokio::test]
async fn test_sqlite_connection_dispatches_to_sqlite_driver() {
    let conn = SqliteConnection::open(":memory:").expect("Failed to open in-memory db");
    let registry = SchemaDriverRegistry::with_defaults();
    let cancel = CancellationToken::new();

    let driver = registry.driver_for(&conn).expect("sqlite driver");
    assert_eq!(driver.dialect(), Dialect::Sqlite);

    let table = Table::with_columns(
        "accounts",
        [
            Column::new("id", HostType::I64).primary_key().auto_increment(),
            Column::new("name", HostType::String).with_length(50),
        ],
    )
    .expect("valid table");

    assert!(
        driver
            .create_table_if_not_exists(&conn, &table, &cancel)
            .await
            .expect("create")
    );
    assert!(
        !driver
            .create_table_if_not_exists(&conn, &table, &cancel)
            .await
            .expect("create again")
    );

    let read = driver
        .require_table(&conn, None, "accounts", &cancel)
        .await
        .expect("read back");
    assert_eq!(read.column_names(), vec!["id", "name"]);
}
