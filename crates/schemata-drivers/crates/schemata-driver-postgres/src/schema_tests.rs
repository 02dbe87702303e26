//! Tests for the PostgreSQL DDL builders

use crate::schema::PostgresSchema;
use pretty_assertions::assert_eq;
use schemata_core::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKeyConstraint, Index, OrderedColumn,
    PrimaryKeyConstraint, ReferentialAction, Table, UniqueConstraint, View,
};
use schemata_core::{Dialect, DialectSchema, HostType, SchemataError, TableAlteration};

fn users() -> Table {
    Table::new("users")
        .with_column(Column::new("id", HostType::I32).primary_key().auto_increment())
        .unwrap()
        .with_column(Column::new("email", HostType::String).with_length(100).nullable().unique())
        .unwrap()
}

#[test]
fn test_create_table_sql_for_identity_and_unique_columns() {
    let schema = PostgresSchema::new();
    assert_eq!(
        schema.create_table_sql(&users()).unwrap(),
        vec![
            "CREATE TABLE \"public\".\"users\" (\
             \"id\" integer GENERATED BY DEFAULT AS IDENTITY NOT NULL, \
             \"email\" varchar(100), \
             CONSTRAINT \"pk_users\" PRIMARY KEY (\"id\"), \
             CONSTRAINT \"uc_users_email\" UNIQUE (\"email\"))"
                .to_string()
        ]
    );
}

#[test]
fn test_create_table_sql_with_defaults_checks_and_indexes() {
    let schema = PostgresSchema::new();
    let table = Table::new("items")
        .in_schema(Some("sales"))
        .with_column(Column::new("sku", HostType::String).with_length(20))
        .unwrap()
        .with_column(
            Column::new("qty", HostType::I32)
                .with_default("0")
                .with_check("qty >= 0")
                .indexed(),
        )
        .unwrap()
        .with_column(Column::new("tags", HostType::List(Box::new(HostType::String))).nullable())
        .unwrap()
        .with_primary_key(["sku"]);

    assert_eq!(
        schema.create_table_sql(&table).unwrap(),
        vec![
            "CREATE TABLE \"sales\".\"items\" (\
             \"sku\" varchar(20) NOT NULL, \
             \"qty\" integer NOT NULL DEFAULT 0, \
             \"tags\" text[], \
             CONSTRAINT \"pk_items\" PRIMARY KEY (\"sku\"), \
             CONSTRAINT \"ck_items_qty\" CHECK (qty >= 0))"
                .to_string(),
            "CREATE INDEX \"ix_items_qty\" ON \"sales\".\"items\" (\"qty\")".to_string(),
        ]
    );
}

#[test]
fn test_constraint_keys_drop_sort_order() {
    let schema = PostgresSchema::new();
    let table = Table::new("events")
        .with_column(Column::new("day", HostType::Date))
        .unwrap()
        .with_column(Column::new("seq", HostType::I64))
        .unwrap()
        .with_primary_key([OrderedColumn::asc("day"), OrderedColumn::desc("seq")]);

    let statements = schema.create_table_sql(&table).unwrap();
    assert!(
        statements[0].contains("CONSTRAINT \"pk_events\" PRIMARY KEY (\"day\", \"seq\")"),
        "{}",
        statements[0]
    );
}

#[test]
fn test_index_order_survives_only_on_plain_indexes() {
    let schema = PostgresSchema::new();
    let plain = Index::new("events", [OrderedColumn::desc("day"), OrderedColumn::asc("seq")]);
    assert_eq!(
        schema.create_index_sql(&plain).unwrap(),
        vec!["CREATE INDEX \"ix_events_day_seq\" ON \"public\".\"events\" (\"day\" DESC, \"seq\")"]
    );

    let unique = plain.clone().named("ux_events").unique();
    assert_eq!(
        schema.create_index_sql(&unique).unwrap(),
        vec!["CREATE UNIQUE INDEX \"ux_events\" ON \"public\".\"events\" (\"day\", \"seq\")"]
    );

    let empty = Index::new("events", Vec::<OrderedColumn>::new()).named("ix_nothing");
    assert!(matches!(
        schema.create_index_sql(&empty),
        Err(SchemataError::Schema(_))
    ));

    assert_eq!(
        schema.drop_index_sql(&unique.in_schema(Some("audit"))),
        vec!["DROP INDEX \"audit\".\"ux_events\""]
    );
}

#[test]
fn test_identity_needs_an_integer_type_and_no_default() {
    let schema = PostgresSchema::new();
    let text_identity = Table::new("t")
        .with_column(Column::new("code", HostType::String).auto_increment())
        .unwrap();
    assert!(matches!(
        schema.create_table_sql(&text_identity),
        Err(SchemataError::Schema(_))
    ));

    let defaulted = Table::new("t")
        .with_column(Column::new("id", HostType::I64).auto_increment().with_default("1"))
        .unwrap();
    assert!(matches!(
        schema.create_table_sql(&defaulted),
        Err(SchemataError::Schema(_))
    ));
}

#[test]
fn test_type_override_wins_over_the_host_type() {
    let schema = PostgresSchema::new();
    let table = Table::new("docs")
        .with_column(
            Column::new("body", HostType::String).with_type_override(Dialect::PostgreSql, "citext"),
        )
        .unwrap();
    let statements = schema.create_table_sql(&table).unwrap();
    assert_eq!(
        statements,
        vec!["CREATE TABLE \"public\".\"docs\" (\"body\" citext NOT NULL)"]
    );
}

#[test]
fn test_add_column_brings_its_constraints_in_one_statement() {
    let schema = PostgresSchema::new();
    let column = Column::new("owner_id", HostType::I64)
        .nullable()
        .references("owners", "id")
        .indexed();

    let statements = schema
        .alteration_sql(&users(), &TableAlteration::AddColumn(column))
        .unwrap();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE \"public\".\"users\" ADD COLUMN \"owner_id\" bigint, \
             ADD CONSTRAINT \"fk_users_owner_id_owners_id\" FOREIGN KEY (\"owner_id\") \
             REFERENCES \"public\".\"owners\" (\"id\") ON DELETE NO ACTION ON UPDATE NO ACTION"
                .to_string(),
            "CREATE INDEX \"ix_users_owner_id\" ON \"public\".\"users\" (\"owner_id\")".to_string(),
        ]
    );
}

#[test]
fn test_column_alterations() {
    let schema = PostgresSchema::new();
    let table = users();
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::DropColumn("email".into()))
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" DROP COLUMN \"email\""]
    );
    assert_eq!(
        schema
            .alteration_sql(
                &table,
                &TableAlteration::RenameColumn {
                    from: "email".into(),
                    to: "mail".into()
                }
            )
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" RENAME COLUMN \"email\" TO \"mail\""]
    );
}

#[test]
fn test_constraint_alterations() {
    let schema = PostgresSchema::new();
    let table = users();

    let fk = ForeignKeyConstraint::new("users", &["org_id"], "orgs", &["id"])
        .referencing_schema(Some("crm"))
        .on_delete(ReferentialAction::Cascade);
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::AddForeignKey(fk.clone()))
            .unwrap(),
        vec![
            "ALTER TABLE \"public\".\"users\" ADD CONSTRAINT \"fk_users_org_id_orgs_id\" \
             FOREIGN KEY (\"org_id\") REFERENCES \"crm\".\"orgs\" (\"id\") \
             ON DELETE CASCADE ON UPDATE NO ACTION"
        ]
    );
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::DropForeignKey(fk))
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" DROP CONSTRAINT \"fk_users_org_id_orgs_id\""]
    );

    let check = CheckConstraint::new("users", None, "id > 0");
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::AddCheck(check))
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" ADD CONSTRAINT \"ck_users\" CHECK (id > 0)"]
    );

    let unique = UniqueConstraint::new("users", [OrderedColumn::desc("email")]);
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::AddUnique(unique))
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" ADD CONSTRAINT \"uc_users_email\" UNIQUE (\"email\")"]
    );

    let pk = PrimaryKeyConstraint::new("users", ["id"]);
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::DropPrimaryKey(pk))
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" DROP CONSTRAINT \"pk_users\""]
    );
}

#[test]
fn test_defaults_alter_the_column() {
    let schema = PostgresSchema::new();
    let default = DefaultConstraint::new("users", "email", "'none'");
    assert_eq!(
        schema
            .alteration_sql(&users(), &TableAlteration::AddDefault(default.clone()))
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" ALTER COLUMN \"email\" SET DEFAULT 'none'"]
    );
    assert_eq!(
        schema
            .alteration_sql(&users(), &TableAlteration::DropDefault(default))
            .unwrap(),
        vec!["ALTER TABLE \"public\".\"users\" ALTER COLUMN \"email\" DROP DEFAULT"]
    );
}

#[test]
fn test_table_view_and_schema_statements() {
    let schema = PostgresSchema::new();
    assert_eq!(
        schema.rename_table_sql(Some("sales"), "items", "products"),
        vec!["ALTER TABLE \"sales\".\"items\" RENAME TO \"products\""]
    );
    assert_eq!(
        schema.truncate_table_sql(None, "items"),
        vec!["TRUNCATE TABLE \"public\".\"items\""]
    );

    let view = View::new("active_users", "SELECT * FROM users WHERE id > 0;");
    assert_eq!(
        schema.create_view_sql(&view),
        vec!["CREATE VIEW \"public\".\"active_users\" AS SELECT * FROM users WHERE id > 0"]
    );
    assert_eq!(
        schema.rename_view_sql(&view, "live_users"),
        vec!["ALTER VIEW \"public\".\"active_users\" RENAME TO \"live_users\""]
    );

    assert_eq!(
        schema.create_schema_sql("audit").unwrap(),
        vec!["CREATE SCHEMA \"audit\""]
    );
    assert!(matches!(
        schema.drop_schema_sql("public"),
        Err(SchemataError::Schema(_))
    ));
}

#[test]
fn test_identifiers_escape_embedded_quotes() {
    let schema = PostgresSchema::new();
    assert_eq!(schema.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    assert_eq!(schema.effective_schema(None), Some("public"));
    assert_eq!(schema.effective_schema(Some("  ")), Some("public"));
}
