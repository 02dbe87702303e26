//! Index scenarios across dialects

use crate::fixtures::{TestDialect, test_database};
use anyhow::{Context, Result};
use pretty_assertions::assert_eq;
use rstest::rstest;
use schemata_core::model::{Column, Index, OrderedColumn, SortOrder, Table};
use schemata_core::{DialectSchema, HostType, IndexMethods, TableMethods, UniqueConstraintMethods};

#[rstest]
#[case::sqlite(TestDialect::Sqlite)]
#[case::postgres(TestDialect::Postgres)]
#[case::mysql(TestDialect::Mysql)]
#[case::mssql(TestDialect::Mssql)]
#[tokio::test]
async fn test_descending_unique_index_round_trips(#[case] dialect: TestDialect) -> Result<()> {
    let Some(db) = test_database(dialect).await? else {
        return Ok(());
    };
    let name = db.table_name("users");
    let table = Table::with_columns(
        &name,
        [
            Column::new("id", HostType::I32).primary_key().auto_increment(),
            Column::new("email", HostType::String).with_length(100).nullable(),
        ],
    )?;
    db.driver
        .create_table_if_not_exists(db.db(), &table, &db.cancel)
        .await?;

    let index_name = format!("{}_email_uq", name);
    let index = Index::new(&name, [OrderedColumn::desc("email"), OrderedColumn::asc("id")])
        .named(&index_name)
        .unique();
    assert!(db.driver.create_index_if_not_exists(db.db(), &index, &db.cancel).await?);
    assert!(!db.driver.create_index_if_not_exists(db.db(), &index, &db.cancel).await?);

    let found = db
        .driver
        .get_index(db.db(), None, &name, &index_name.to_uppercase(), &db.cancel)
        .await?
        .context("index not found")?;
    assert!(found.is_unique);
    assert_eq!(found.column_names(), vec!["email", "id"]);
    let capabilities = db.driver.capabilities();
    let leading = if capabilities.supports_ordered_keys_in_constraints {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    };
    assert_eq!(found.columns[0].order, leading);
    assert_eq!(found.columns[1].order, SortOrder::Ascending);

    if capabilities.unique_constraints_are_indexes {
        assert!(
            db.driver
                .unique_constraint_exists(db.db(), None, &name, &index_name, &db.cancel)
                .await?
        );
    } else {
        let on_email = db
            .driver
            .get_indexes_on_column(db.db(), None, &name, "email", &db.cancel)
            .await?;
        assert!(
            on_email
                .iter()
                .any(|i| i.index_name.eq_ignore_ascii_case(&index_name))
        );
    }

    assert!(
        db.driver
            .drop_index_if_exists(db.db(), None, &name, &index_name, &db.cancel)
            .await?
    );
    assert!(
        !db.driver
            .drop_index_if_exists(db.db(), None, &name, &index_name, &db.cancel)
            .await?
    );
    assert!(
        !db.driver
            .index_exists(db.db(), None, &name, &index_name, &db.cancel)
            .await?
    );

    db.cleanup().await
}

#[rstest]
#[case::sqlite(TestDialect::Sqlite)]
#[case::postgres(TestDialect::Postgres)]
#[case::mysql(TestDialect::Mysql)]
#[case::mssql(TestDialect::Mssql)]
#[tokio::test]
async fn test_indexed_column_gets_the_generated_index_name(
    #[case] dialect: TestDialect,
) -> Result<()> {
    let Some(db) = test_database(dialect).await? else {
        return Ok(());
    };
    let name = db.table_name("events");
    let table = Table::with_columns(
        &name,
        [
            Column::new("id", HostType::I64).primary_key(),
            Column::new("kind", HostType::String).with_length(40).indexed(),
        ],
    )?;
    db.driver
        .create_table_if_not_exists(db.db(), &table, &db.cancel)
        .await?;

    let expected = schemata_core::model::naming::index(&name, &["kind"]);
    let names = db
        .driver
        .get_index_names(db.db(), None, &name, None, &db.cancel)
        .await?;
    assert!(
        names.iter().any(|n| n.eq_ignore_ascii_case(&expected)),
        "{:?} lacks {}",
        names,
        expected
    );

    db.cleanup().await
}
