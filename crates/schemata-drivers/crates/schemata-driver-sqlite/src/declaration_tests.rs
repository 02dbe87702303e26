//! Tests for reading stored CREATE TABLE and CREATE VIEW text

use crate::schema::{DeclaredKind, TableDeclaration, view_body};
use pretty_assertions::assert_eq;

#[test]
fn test_named_column_and_table_constraints() {
    let declaration = TableDeclaration::parse(
        r#"CREATE TABLE "orders" (
            "id" INTEGER CONSTRAINT "pk_orders" PRIMARY KEY AUTOINCREMENT,
            "code" varchar(20) NOT NULL CONSTRAINT "df_orders_code" DEFAULT 'new',
            "qty" int CONSTRAINT "ck_orders_qty" CHECK (qty > 0),
            "customer" int,
            CONSTRAINT "uc_orders_code" UNIQUE ("code" DESC),
            CONSTRAINT "fk_orders_customer" FOREIGN KEY ("customer") REFERENCES "customers" ("id") ON DELETE SET NULL ON UPDATE NO ACTION
        )"#,
    );

    assert_eq!(declaration.autoincrement_column.as_deref(), Some("id"));
    assert_eq!(
        declaration.name_for(DeclaredKind::PrimaryKey, &["id"]),
        Some("pk_orders")
    );
    assert_eq!(
        declaration.name_for(DeclaredKind::Default, &["CODE"]),
        Some("df_orders_code")
    );
    assert_eq!(
        declaration.name_for(DeclaredKind::Unique, &["code"]),
        Some("uc_orders_code")
    );
    assert_eq!(
        declaration.name_for(DeclaredKind::ForeignKey, &["customer"]),
        Some("fk_orders_customer")
    );

    let checks: Vec<_> = declaration.checks().collect();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].name.as_deref(), Some("ck_orders_qty"));
    assert_eq!(checks[0].column.as_deref(), Some("qty"));
    assert_eq!(checks[0].expression.as_deref(), Some("qty > 0"));
}

#[test]
fn test_unnamed_constraints_have_no_name() {
    let declaration = TableDeclaration::parse(
        "CREATE TABLE t (a INTEGER PRIMARY KEY, b TEXT UNIQUE, CHECK (length(b) < 10))",
    );
    assert_eq!(declaration.autoincrement_column, None);
    assert_eq!(declaration.name_for(DeclaredKind::PrimaryKey, &["a"]), None);
    assert_eq!(declaration.name_for(DeclaredKind::Unique, &["b"]), None);

    let check = declaration.checks().next().unwrap();
    assert_eq!(check.column, None);
    assert_eq!(check.expression.as_deref(), Some("length(b) < 10"));
}

#[test]
fn test_constraint_name_does_not_leak_past_not_null() {
    let declaration =
        TableDeclaration::parse("CREATE TABLE t (a int CONSTRAINT nn NOT NULL UNIQUE)");
    assert_eq!(declaration.name_for(DeclaredKind::Unique, &["a"]), None);
}

#[test]
fn test_composite_keys_match_in_order() {
    let declaration = TableDeclaration::parse(
        "CREATE TABLE t (a int, b int, CONSTRAINT pk_t PRIMARY KEY (a, b DESC))",
    );
    assert_eq!(declaration.name_for(DeclaredKind::PrimaryKey, &["a", "b"]), Some("pk_t"));
    assert_eq!(declaration.name_for(DeclaredKind::PrimaryKey, &["b", "a"]), None);
    assert_eq!(declaration.name_for(DeclaredKind::PrimaryKey, &["a"]), None);
}

#[test]
fn test_garbage_yields_empty_declaration() {
    assert_eq!(TableDeclaration::parse("not a table"), TableDeclaration::default());
    assert_eq!(TableDeclaration::parse(""), TableDeclaration::default());
}

#[test]
fn test_view_body_is_the_select() {
    assert_eq!(
        view_body(r#"CREATE VIEW "active" AS SELECT id FROM users WHERE active = 1;"#).as_deref(),
        Some("SELECT id FROM users WHERE active = 1")
    );
    assert_eq!(
        view_body("CREATE VIEW v (x, y) AS SELECT 1, 2").as_deref(),
        Some("SELECT 1, 2")
    );
    assert_eq!(view_body("CREATE VIEW broken"), None);
}
