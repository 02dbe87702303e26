//! Tests for the schema model

use super::*;
use crate::typemap::HostType;
use crate::{Dialect, SchemataError};
use pretty_assertions::assert_eq;

fn orders() -> Table {
    Table::new("orders")
        .in_schema(Some("sales"))
        .with_column(Column::new("id", HostType::I64).auto_increment().primary_key())
        .unwrap()
        .with_column(
            Column::new("status", HostType::String)
                .with_length(20)
                .with_default("'new'")
                .with_check("status <> ''"),
        )
        .unwrap()
        .with_column(
            Column::new("customer_id", HostType::I32)
                .references("customers", "id")
                .indexed(),
        )
        .unwrap()
        .with_column(
            Column::new("reference", HostType::Nullable(Box::new(HostType::String)))
                .with_length(100)
                .unique(),
        )
        .unwrap()
}

#[test]
fn test_duplicate_column_names_are_rejected() {
    let err = Table::new("t")
        .with_column(Column::new("Name", HostType::String))
        .unwrap()
        .with_column(Column::new("name", HostType::I32))
        .unwrap_err();
    assert!(matches!(err, SchemataError::Schema(_)));

    let literal = Table {
        table_name: "t".into(),
        columns: vec![
            Column::new("a", HostType::I32),
            Column::new("A", HostType::I32),
        ],
        ..Default::default()
    };
    assert!(matches!(literal.validate(), Err(SchemataError::Schema(_))));
}

#[test]
fn test_column_without_type_or_override_is_rejected() {
    let err = Table::new("t")
        .with_column(Column::untyped("mystery"))
        .unwrap_err();
    assert!(matches!(err, SchemataError::Schema(_)));

    let overridden = Column::untyped("shape").with_type_override(Dialect::PostgreSql, "geometry");
    assert!(overridden.validate().is_ok());
    let shorthand = Column::untyped("shape").with_type_shorthand("{pg:geometry,mssql:geography}");
    assert!(shorthand.validate().is_ok());
    let malformed = Column::untyped("shape").with_type_shorthand("{pg:geometry");
    assert!(matches!(
        malformed.validate(),
        Err(SchemataError::Configuration(_))
    ));
}

#[test]
fn test_columns_take_table_identity_and_nullability() {
    let table = orders();
    let reference = table.column("REFERENCE").unwrap();
    assert_eq!(reference.table_name, "orders");
    assert_eq!(reference.schema_name.as_deref(), Some("sales"));
    assert!(reference.is_nullable);
    assert_eq!(reference.host_type, Some(HostType::String));
    assert!(!table.column("status").unwrap().is_nullable);
    assert_eq!(table.column_names(), vec!["id", "status", "customer_id", "reference"]);
}

#[test]
fn test_effective_constraints_fold_column_flags() {
    let effective = orders().effective_constraints();

    let pk = effective.primary_key.unwrap();
    assert_eq!(pk.constraint_name, "pk_orders");
    assert_eq!(pk.column_names(), vec!["id"]);
    assert_eq!(pk.schema_name.as_deref(), Some("sales"));

    assert_eq!(effective.defaults.len(), 1);
    assert_eq!(effective.defaults[0].constraint_name, "df_orders_status");
    assert_eq!(effective.defaults[0].expression, "'new'");

    assert_eq!(effective.checks[0].constraint_name, "ck_orders_status");
    assert_eq!(effective.uniques[0].constraint_name, "uc_orders_reference");
    assert_eq!(
        effective.foreign_keys[0].constraint_name,
        "fk_orders_customer_id_customers_id"
    );
    assert_eq!(effective.indexes[0].index_name, "ix_orders_customer_id");
    assert!(!effective.indexes[0].is_unique);
}

#[test]
fn test_table_level_declarations_win() {
    let table = orders()
        .with_default(DefaultConstraint::new("orders", "status", "'open'").named("status_default"))
        .with_index(Index::new("orders", ["customer_id", "status"]).named("ix_customer_status"));
    let effective = table.effective_constraints();
    assert_eq!(effective.defaults.len(), 1);
    assert_eq!(effective.defaults[0].constraint_name, "status_default");
    assert_eq!(effective.indexes.len(), 1);
    assert_eq!(effective.indexes[0].index_name, "ix_customer_status");
}

#[test]
fn test_unique_on_primary_key_is_not_duplicated() {
    let table = Table::new("t")
        .with_column(Column::new("id", HostType::I32).primary_key().unique())
        .unwrap();
    assert!(table.effective_constraints().uniques.is_empty());
}

#[test]
fn test_sync_column_flags_mirrors_constraints() {
    let mut table = Table::new("users")
        .with_column(Column::new("id", HostType::I32))
        .unwrap()
        .with_column(Column::new("email", HostType::String))
        .unwrap()
        .with_column(Column::new("team_id", HostType::I32))
        .unwrap()
        .with_primary_key(["id"])
        .with_unique(UniqueConstraint::new("users", ["email"]))
        .with_default(DefaultConstraint::new("users", "team_id", "0"))
        .with_foreign_key(
            ForeignKeyConstraint::new("users", &["team_id"], "teams", &["id"])
                .on_delete(ReferentialAction::Cascade),
        );
    table.sync_column_flags();

    let id = table.column("id").unwrap();
    assert!(id.is_primary_key);
    assert_eq!(id.primary_key_constraint_name.as_deref(), Some("pk_users"));

    let email = table.column("email").unwrap();
    assert!(email.is_unique);
    assert_eq!(email.unique_constraint_name.as_deref(), Some("uc_users_email"));

    let team = table.column("team_id").unwrap();
    assert_eq!(team.default_constraint_name.as_deref(), Some("df_users_team_id"));
    let fk = team.foreign_key.as_ref().unwrap();
    assert_eq!(fk.referenced_table_name, "teams");
    assert_eq!(fk.on_delete, ReferentialAction::Cascade);

    // folding back produces nothing new
    let effective = table.effective_constraints();
    assert_eq!(effective.uniques.len(), 1);
    assert_eq!(effective.defaults.len(), 1);
    assert_eq!(effective.foreign_keys.len(), 1);
}

#[test]
fn test_referential_actions_from_catalog_text() {
    assert_eq!(ReferentialAction::from_catalog("SET_NULL"), ReferentialAction::SetNull);
    assert_eq!(ReferentialAction::from_catalog("set default"), ReferentialAction::SetDefault);
    assert_eq!(ReferentialAction::from_catalog("c"), ReferentialAction::Cascade);
    assert_eq!(ReferentialAction::from_catalog("a"), ReferentialAction::NoAction);
    assert_eq!(ReferentialAction::Restrict.to_string(), "RESTRICT");
}

#[test]
fn test_model_serializes() {
    let table = orders();
    let json = serde_json::to_string(&table).unwrap();
    let back: Table = serde_json::from_str(&json).unwrap();
    assert_eq!(back, table);
}
