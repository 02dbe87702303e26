//! Tests for the SQL Server DDL builders

use crate::schema::MssqlSchema;
use pretty_assertions::assert_eq;
use schemata_core::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKeyConstraint, Index, OrderedColumn,
    PrimaryKeyConstraint, ReferentialAction, Table, View,
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
    let schema = MssqlSchema::new();
    assert_eq!(
        schema.create_table_sql(&users()).unwrap(),
        vec![
            "CREATE TABLE [dbo].[users] (\
             [id] int IDENTITY(1,1) NOT NULL, \
             [email] nvarchar(100) NULL, \
             CONSTRAINT [pk_users] PRIMARY KEY ([id]), \
             CONSTRAINT [uc_users_email] UNIQUE ([email]))"
                .to_string()
        ]
    );
}

#[test]
fn test_create_table_sql_names_defaults_and_emits_indexes_separately() {
    let schema = MssqlSchema::new();
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
        .with_column(Column::new("owner_id", HostType::I64).nullable().references("owners", "id"))
        .unwrap()
        .with_primary_key(["sku"]);

    assert_eq!(
        schema.create_table_sql(&table).unwrap(),
        vec![
            "CREATE TABLE [sales].[items] (\
             [sku] nvarchar(20) NOT NULL, \
             [qty] int NOT NULL CONSTRAINT [df_items_qty] DEFAULT 0, \
             [owner_id] bigint NULL, \
             CONSTRAINT [pk_items] PRIMARY KEY ([sku]), \
             CONSTRAINT [ck_items_qty] CHECK (qty >= 0), \
             CONSTRAINT [fk_items_owner_id_owners_id] FOREIGN KEY ([owner_id]) \
             REFERENCES [sales].[owners] ([id]) ON DELETE NO ACTION ON UPDATE NO ACTION)"
                .to_string(),
            "CREATE INDEX [ix_items_qty] ON [sales].[items] ([qty])".to_string(),
        ]
    );
}

#[test]
fn test_key_order_is_kept_in_constraints() {
    let schema = MssqlSchema::new();
    let table = Table::new("events")
        .with_column(Column::new("day", HostType::Date))
        .unwrap()
        .with_column(Column::new("seq", HostType::I32))
        .unwrap()
        .with_primary_key([OrderedColumn::desc("day"), OrderedColumn::asc("seq")]);

    assert_eq!(
        schema.create_table_sql(&table).unwrap(),
        vec![
            "CREATE TABLE [dbo].[events] (\
             [day] date NOT NULL, \
             [seq] int NOT NULL, \
             CONSTRAINT [pk_events] PRIMARY KEY ([day] DESC, [seq]))"
                .to_string()
        ]
    );
}

#[test]
fn test_identity_rules() {
    let schema = MssqlSchema::new();
    let text_identity = Table::new("t")
        .with_column(Column::new("code", HostType::String).with_length(10).auto_increment())
        .unwrap();
    assert!(matches!(
        schema.create_table_sql(&text_identity),
        Err(SchemataError::Schema(_))
    ));

    let defaulted = Table::new("t")
        .with_column(Column::new("id", HostType::I32).auto_increment().with_default("1"))
        .unwrap();
    assert!(matches!(
        schema.create_table_sql(&defaulted),
        Err(SchemataError::Schema(_))
    ));

    let decimal = Table::new("t")
        .with_column(
            Column::new("id", HostType::Decimal)
                .with_precision(10, Some(0))
                .auto_increment(),
        )
        .unwrap();
    assert_eq!(
        schema.create_table_sql(&decimal).unwrap(),
        vec!["CREATE TABLE [dbo].[t] ([id] decimal(10,0) IDENTITY(1,1) NOT NULL)"]
    );
}

#[test]
fn test_index_statements_keep_their_order() {
    let schema = MssqlSchema::new();
    let plain = Index::new("events", [OrderedColumn::desc("day"), OrderedColumn::asc("seq")]);
    assert_eq!(
        schema.create_index_sql(&plain).unwrap(),
        vec!["CREATE INDEX [ix_events_day_seq] ON [dbo].[events] ([day] DESC, [seq])"]
    );

    let unique = plain.clone().named("ux_events").unique();
    assert_eq!(
        schema.create_index_sql(&unique).unwrap(),
        vec!["CREATE UNIQUE INDEX [ux_events] ON [dbo].[events] ([day] DESC, [seq])"]
    );
    assert_eq!(
        schema.drop_index_sql(&unique),
        vec!["DROP INDEX [ux_events] ON [dbo].[events]"]
    );
}

#[test]
fn test_column_types_follow_overrides_and_unicode_hints() {
    let schema = MssqlSchema::new();
    let table = Table::new("docs")
        .with_column(
            Column::new("body", HostType::String).with_type_override(Dialect::SqlServer, "ntext"),
        )
        .unwrap()
        .with_column(
            Column::new("code", HostType::String)
                .with_length(50)
                .unicode(false),
        )
        .unwrap();
    assert_eq!(
        schema.create_table_sql(&table).unwrap(),
        vec!["CREATE TABLE [dbo].[docs] ([body] ntext NOT NULL, [code] varchar(50) NOT NULL)"]
    );
}

#[test]
fn test_add_column_uses_one_add_then_indexes() {
    let schema = MssqlSchema::new();
    let column = Column::new("owner_id", HostType::I64)
        .nullable()
        .references("owners", "id")
        .indexed();

    assert_eq!(
        schema
            .alteration_sql(&users(), &TableAlteration::AddColumn(column))
            .unwrap(),
        vec![
            "ALTER TABLE [dbo].[users] ADD [owner_id] bigint NULL, \
             CONSTRAINT [fk_users_owner_id_owners_id] FOREIGN KEY ([owner_id]) \
             REFERENCES [dbo].[owners] ([id]) ON DELETE NO ACTION ON UPDATE NO ACTION",
            "CREATE INDEX [ix_users_owner_id] ON [dbo].[users] ([owner_id])",
        ]
    );
}

#[test]
fn test_drop_column_releases_everything_that_uses_it() {
    let schema = MssqlSchema::new();
    let table = users()
        .with_index(Index::new("users", ["email"]))
        .with_default(DefaultConstraint::new("users", "email", "'none'"))
        .with_foreign_key(ForeignKeyConstraint::new("users", &["email"], "emails", &["address"]))
        .with_check(CheckConstraint::new("users", None, "[email] <> ''"))
        .with_check(CheckConstraint::new("users", None, "id > 0").named("ck_users_id"));

    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::DropColumn("email".into()))
            .unwrap(),
        vec![
            "DROP INDEX [ix_users_email] ON [dbo].[users]",
            "ALTER TABLE [dbo].[users] DROP CONSTRAINT [df_users_email], \
             CONSTRAINT [ck_users], CONSTRAINT [uc_users_email], \
             CONSTRAINT [fk_users_email_emails_address], COLUMN [email]",
        ]
    );
}

#[test]
fn test_dropping_a_key_column_drops_the_key() {
    let schema = MssqlSchema::new();
    assert_eq!(
        schema
            .alteration_sql(&users(), &TableAlteration::DropColumn("id".into()))
            .unwrap(),
        vec!["ALTER TABLE [dbo].[users] DROP CONSTRAINT [pk_users], COLUMN [id]"]
    );
}

#[test]
fn test_constraint_alterations() {
    let schema = MssqlSchema::new();
    let table = users();

    let fk = ForeignKeyConstraint::new("users", &["org_id"], "orgs", &["id"])
        .on_delete(ReferentialAction::Restrict)
        .on_update(ReferentialAction::Cascade);
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::AddForeignKey(fk.clone()))
            .unwrap(),
        vec![
            "ALTER TABLE [dbo].[users] ADD CONSTRAINT [fk_users_org_id_orgs_id] \
             FOREIGN KEY ([org_id]) REFERENCES [dbo].[orgs] ([id]) \
             ON DELETE NO ACTION ON UPDATE CASCADE"
        ]
    );
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::DropForeignKey(fk))
            .unwrap(),
        vec!["ALTER TABLE [dbo].[users] DROP CONSTRAINT [fk_users_org_id_orgs_id]"]
    );

    let pk = PrimaryKeyConstraint::new("users", [OrderedColumn::desc("id")]);
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::AddPrimaryKey(pk.clone()))
            .unwrap(),
        vec!["ALTER TABLE [dbo].[users] ADD CONSTRAINT [pk_users] PRIMARY KEY ([id] DESC)"]
    );
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::DropPrimaryKey(pk))
            .unwrap(),
        vec!["ALTER TABLE [dbo].[users] DROP CONSTRAINT [pk_users]"]
    );

    let check = CheckConstraint::new("users", Some("email"), "len([email]) > 3");
    assert_eq!(
        schema
            .alteration_sql(&table, &TableAlteration::AddCheck(check))
            .unwrap(),
        vec!["ALTER TABLE [dbo].[users] ADD CONSTRAINT [ck_users_email] CHECK (len([email]) > 3)"]
    );
}

#[test]
fn test_defaults_are_named_constraints() {
    let schema = MssqlSchema::new();
    let default = DefaultConstraint::new("users", "email", "'none'");
    assert_eq!(
        schema
            .alteration_sql(&users(), &TableAlteration::AddDefault(default.clone()))
            .unwrap(),
        vec!["ALTER TABLE [dbo].[users] ADD CONSTRAINT [df_users_email] DEFAULT 'none' FOR [email]"]
    );
    assert_eq!(
        schema
            .alteration_sql(&users(), &TableAlteration::DropDefault(default))
            .unwrap(),
        vec!["ALTER TABLE [dbo].[users] DROP CONSTRAINT [df_users_email]"]
    );
}

#[test]
fn test_renames_go_through_sp_rename() {
    let schema = MssqlSchema::new();
    assert_eq!(
        schema.rename_table_sql(Some("sales"), "items", "products"),
        vec!["EXEC sp_rename N'[sales].[items]', N'products'"]
    );
    assert_eq!(
        schema
            .alteration_sql(
                &users(),
                &TableAlteration::RenameColumn {
                    from: "email".into(),
                    to: "o'mail".into()
                }
            )
            .unwrap(),
        vec!["EXEC sp_rename N'[dbo].[users].[email]', N'o''mail', N'COLUMN'"]
    );
    assert_eq!(
        schema.rename_view_sql(&View::new("v1", "SELECT 1"), "v2"),
        vec!["EXEC sp_rename N'[dbo].[v1]', N'v2'"]
    );
}

#[test]
fn test_schemas() {
    let schema = MssqlSchema::new();
    assert_eq!(schema.effective_schema(None), Some("dbo"));
    assert_eq!(schema.qualify(Some("sales"), "items"), "[sales].[items]");
    assert_eq!(schema.quote_identifier("we]ird"), "[we]]ird]");
    assert_eq!(schema.create_schema_sql("sales").unwrap(), vec!["CREATE SCHEMA [sales]"]);
    assert_eq!(schema.drop_schema_sql("sales").unwrap(), vec!["DROP SCHEMA [sales]"]);
    assert!(matches!(
        schema.drop_schema_sql("DBO"),
        Err(SchemataError::Schema(_))
    ));
    assert_eq!(
        schema.truncate_table_sql(None, "items"),
        vec!["TRUNCATE TABLE [dbo].[items]"]
    );
}
