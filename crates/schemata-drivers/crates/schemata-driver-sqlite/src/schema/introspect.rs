//! Catalog reads through `sqlite_master` and the PRAGMA table-valued functions

use super::SqliteSchema;
use super::ddl::is_wrapped;
use super::declaration::{DeclaredKind, TableDeclaration, view_body};
use crate::types::affinity_host_type;
use schemata_core::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKeyConstraint, Index, OrderedColumn,
    PrimaryKeyConstraint, ReferentialAction, Table, UniqueConstraint, View, naming,
};
use schemata_core::schema::DialectSchema;
use schemata_core::{CancellationToken, Dialect, Result, Row, SqlExecutor, Value, cancellation};
use std::collections::BTreeMap;

pub(super) async fn table_names(
    db: &dyn SqlExecutor,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let result = cancellation::query(
        db,
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
         ORDER BY name",
        &[],
        cancel,
    )
    .await?;
    Ok(result.rows.iter().filter_map(|row| row.text("name")).collect())
}

pub(super) async fn views(db: &dyn SqlExecutor, cancel: &CancellationToken) -> Result<Vec<View>> {
    let result = cancellation::query(
        db,
        "SELECT name, sql FROM sqlite_master WHERE type = 'view' ORDER BY name",
        &[],
        cancel,
    )
    .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.text("name")?;
            let sql = row.text_or_empty("sql");
            let definition = view_body(&sql).unwrap_or(sql);
            Some(View::new(name, definition))
        })
        .collect())
}

pub(super) async fn table(
    schema: &SqliteSchema,
    db: &dyn SqlExecutor,
    table_name: &str,
    cancel: &CancellationToken,
) -> Result<Option<Table>> {
    let found = cancellation::query(
        db,
        "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        &[Value::from(table_name)],
        cancel,
    )
    .await?;
    let Some(row) = found.rows.first() else {
        return Ok(None);
    };
    let name = row.text_or_empty("name");
    let declaration = TableDeclaration::parse(&row.text_or_empty("sql"));

    let mut table = Table::new(name.clone());
    let key_positions = load_columns(schema, db, &mut table, &declaration, cancel).await?;
    if !key_positions.is_empty() {
        let mut key_columns: Vec<(i64, String)> = key_positions;
        key_columns.sort_by_key(|(position, _)| *position);
        let columns: Vec<&str> = key_columns.iter().map(|(_, c)| c.as_str()).collect();
        let mut pk = PrimaryKeyConstraint::new(name.as_str(), columns.iter().copied());
        if let Some(declared) = declaration.name_for(DeclaredKind::PrimaryKey, &columns) {
            pk = pk.named(declared);
        }
        table.primary_key = Some(pk);
    }

    load_indexes(db, &mut table, &declaration, cancel).await?;
    load_foreign_keys(db, &mut table, &declaration, cancel).await?;

    for check in declaration.checks() {
        let Some(expression) = &check.expression else {
            continue;
        };
        let mut constraint =
            CheckConstraint::new(name.as_str(), check.column.as_deref(), expression.clone());
        if let Some(declared) = &check.name {
            constraint = constraint.named(declared.clone());
        }
        table.check_constraints.push(constraint);
    }

    tracing::debug!(
        table = %name,
        columns = table.columns.len(),
        indexes = table.indexes.len(),
        foreign_keys = table.foreign_key_constraints.len(),
        "introspected sqlite table"
    );
    Ok(Some(table))
}

/// Load the columns and their defaults. Returns the primary key columns with
/// their key positions.
async fn load_columns(
    schema: &SqliteSchema,
    db: &dyn SqlExecutor,
    table: &mut Table,
    declaration: &TableDeclaration,
    cancel: &CancellationToken,
) -> Result<Vec<(i64, String)>> {
    let result = cancellation::query(
        db,
        "SELECT cid, name, type, \"notnull\", dflt_value, pk \
         FROM pragma_table_info(?1) ORDER BY cid",
        &[Value::from(table.table_name.as_str())],
        cancel,
    )
    .await?;

    let key_count = result.rows.iter().filter(|r| r.int("pk").unwrap_or(0) > 0).count();
    let mut key_positions = Vec::new();

    for row in &result.rows {
        let column_name = row.text_or_empty("name");
        let declared_type = row.text_or_empty("type");
        let key_position = row.int("pk").unwrap_or(0);

        let mut column = column_from_declared_type(schema, &column_name, &declared_type);
        column.table_name = table.table_name.clone();
        column.is_nullable = !row.flag("notnull");
        // an INTEGER PRIMARY KEY is the rowid and never NULL
        if key_position > 0 && key_count == 1 && declared_type.eq_ignore_ascii_case("integer") {
            column.is_nullable = false;
        }
        column.is_auto_increment = declaration
            .autoincrement_column
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(&column_name));

        if let Some(raw_default) = row.text("dflt_value") {
            let expression = strip_outer_parens(&raw_default);
            let mut default =
                DefaultConstraint::new(table.table_name.as_str(), column_name.as_str(), expression);
            if let Some(declared) =
                declaration.name_for(DeclaredKind::Default, &[column_name.as_str()])
            {
                default = default.named(declared);
            }
            table.default_constraints.push(default);
        }

        if key_position > 0 {
            key_positions.push((key_position, column_name.clone()));
        }
        table.columns.push(column);
    }
    Ok(key_positions)
}

/// A column typed from its declared type text. The text is kept as the SQLite
/// override so the column recreates exactly as declared.
pub(super) fn column_from_declared_type(
    schema: &SqliteSchema,
    column_name: &str,
    declared_type: &str,
) -> Column {
    let descriptor = schema
        .type_map()
        .reverse(declared_type)
        .unwrap_or_else(|_| affinity_host_type(declared_type));

    let mut column = Column::new(column_name, descriptor.host_type().clone());
    column.length = descriptor.length;
    column.precision = descriptor.precision;
    column.scale = descriptor.scale;
    column.is_unicode = descriptor.is_unicode;
    column.is_fixed_length = descriptor.is_fixed_length;
    if !declared_type.trim().is_empty() {
        column
            .dialect_types
            .insert(Dialect::Sqlite, declared_type.to_string());
    }
    column
}

async fn load_indexes(
    db: &dyn SqlExecutor,
    table: &mut Table,
    declaration: &TableDeclaration,
    cancel: &CancellationToken,
) -> Result<()> {
    let list = cancellation::query(
        db,
        "SELECT name, \"unique\", origin FROM pragma_index_list(?1)",
        &[Value::from(table.table_name.as_str())],
        cancel,
    )
    .await?;

    for row in &list.rows {
        let Some(index_name) = row.text("name") else {
            continue;
        };
        let info = cancellation::query(
            db,
            "SELECT seqno, name, \"desc\" FROM pragma_index_xinfo(?1) \
             WHERE \"key\" = 1 ORDER BY seqno",
            &[Value::from(index_name.as_str())],
            cancel,
        )
        .await?;

        let mut columns = Vec::with_capacity(info.rows.len());
        let mut on_expression = false;
        for key in &info.rows {
            match key.text("name") {
                Some(column_name) if key.flag("desc") => columns.push(OrderedColumn::desc(column_name)),
                Some(column_name) => columns.push(OrderedColumn::asc(column_name)),
                None => on_expression = true,
            }
        }
        if on_expression || columns.is_empty() {
            tracing::debug!(index = %index_name, "skipping expression index");
            continue;
        }

        match row.text_or_empty("origin").as_str() {
            "pk" => {
                if let Some(pk) = &mut table.primary_key {
                    pk.columns = columns;
                }
            }
            "u" => {
                let names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
                let declared = declaration
                    .name_for(DeclaredKind::Unique, &names)
                    .map(str::to_string);
                let mut unique = UniqueConstraint::new(table.table_name.as_str(), columns);
                if let Some(declared) = declared {
                    unique = unique.named(declared);
                }
                table.unique_constraints.push(unique);
            }
            _ => {
                let mut index = Index::new(table.table_name.as_str(), columns).named(index_name);
                if row.flag("unique") {
                    index = index.unique();
                }
                table.indexes.push(index);
            }
        }
    }
    Ok(())
}

async fn load_foreign_keys(
    db: &dyn SqlExecutor,
    table: &mut Table,
    declaration: &TableDeclaration,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete \
         FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        &[Value::from(table.table_name.as_str())],
        cancel,
    )
    .await?;

    let mut groups: BTreeMap<i64, Vec<&Row>> = BTreeMap::new();
    for row in &result.rows {
        groups.entry(row.int("id").unwrap_or(0)).or_default().push(row);
    }

    for rows in groups.values() {
        let Some(first) = rows.first() else {
            continue;
        };
        let referenced_table = first.text_or_empty("table");
        let columns: Vec<String> = rows.iter().map(|r| r.text_or_empty("from")).collect();
        let mut referenced_columns: Vec<String> = rows.iter().filter_map(|r| r.text("to")).collect();
        if referenced_columns.len() != columns.len() {
            // `REFERENCES parent` without a column list targets the parent's key
            referenced_columns = parent_key_columns(db, &referenced_table, cancel).await?;
        }

        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        let referenced_refs: Vec<&str> = referenced_columns.iter().map(String::as_str).collect();
        let mut fk = ForeignKeyConstraint::new(
            table.table_name.as_str(),
            &column_refs,
            referenced_table.as_str(),
            &referenced_refs,
        )
        .on_delete(ReferentialAction::from_catalog(&first.text_or_empty("on_delete")))
        .on_update(ReferentialAction::from_catalog(&first.text_or_empty("on_update")));
        if let Some(declared) = declaration.name_for(DeclaredKind::ForeignKey, &column_refs) {
            fk = fk.named(declared);
        }
        table.foreign_key_constraints.push(fk);
    }
    Ok(())
}

async fn parent_key_columns(
    db: &dyn SqlExecutor,
    parent: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let result = cancellation::query(
        db,
        "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
        &[Value::from(parent)],
        cancel,
    )
    .await?;
    Ok(result.rows.iter().filter_map(|row| row.text("name")).collect())
}

fn strip_outer_parens(expression: &str) -> String {
    let trimmed = expression.trim();
    if is_wrapped(trimmed) {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}
