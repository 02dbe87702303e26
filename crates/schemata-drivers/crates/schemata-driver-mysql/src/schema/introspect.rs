//! Catalog reads through `information_schema`, scoped to `DATABASE()`

use super::MySqlSchema;
use schemata_core::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKeyConstraint, Index, OrderedColumn,
    PrimaryKeyConstraint, ReferentialAction, Table, UniqueConstraint, View, naming,
};
use schemata_core::schema::{DialectSchema, find_name};
use schemata_core::{CancellationToken, Dialect, Result, Row, SqlExecutor, Value, cancellation};
use std::collections::HashSet;

const NUMERIC_TYPES: &[&str] = &[
    "tinyint", "smallint", "mediumint", "int", "integer", "bigint", "decimal", "numeric",
    "float", "double", "real", "bit", "year",
];

pub(super) async fn table_names(
    db: &dyn SqlExecutor,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let result = cancellation::query(
        db,
        "SELECT TABLE_NAME AS name FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_NAME",
        &[],
        cancel,
    )
    .await?;
    Ok(result.rows.iter().filter_map(|row| row.text("name")).collect())
}

pub(super) async fn views(db: &dyn SqlExecutor, cancel: &CancellationToken) -> Result<Vec<View>> {
    let result = cancellation::query(
        db,
        "SELECT TABLE_NAME AS name, VIEW_DEFINITION AS definition \
         FROM information_schema.VIEWS \
         WHERE TABLE_SCHEMA = DATABASE() \
         ORDER BY TABLE_NAME",
        &[],
        cancel,
    )
    .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.text("name")?;
            let definition = row.text_or_empty("definition");
            Some(View::new(name, definition.trim().trim_end_matches(';').trim_end()))
        })
        .collect())
}

pub(super) async fn index_exists(
    db: &dyn SqlExecutor,
    table_name: &str,
    index_name: &str,
    cancel: &CancellationToken,
) -> Result<bool> {
    let result = cancellation::query(
        db,
        "SELECT 1 AS found FROM information_schema.STATISTICS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME = ? \
         LIMIT 1",
        &[Value::from(table_name), Value::from(index_name)],
        cancel,
    )
    .await?;
    Ok(result.has_rows())
}

pub(super) async fn table(
    schema: &MySqlSchema,
    db: &dyn SqlExecutor,
    table_name: &str,
    cancel: &CancellationToken,
) -> Result<Option<Table>> {
    let names = table_names(db, cancel).await?;
    let Some(name) = find_name(&names, table_name) else {
        return Ok(None);
    };

    let mut table = Table::new(name);
    load_columns(schema, db, &mut table, cancel).await?;
    load_foreign_keys(db, &mut table, cancel).await?;
    load_keys(db, &mut table, cancel).await?;
    load_checks(db, &mut table, cancel).await?;

    tracing::debug!(
        table = %name,
        columns = table.columns.len(),
        indexes = table.indexes.len(),
        foreign_keys = table.foreign_key_constraints.len(),
        "introspected mysql table"
    );
    Ok(Some(table))
}

async fn load_columns(
    schema: &MySqlSchema,
    db: &dyn SqlExecutor,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT COLUMN_NAME AS name, COLUMN_TYPE AS column_type, DATA_TYPE AS data_type, \
                IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default, EXTRA AS extra \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
         ORDER BY ORDINAL_POSITION",
        &[Value::from(table.table_name.as_str())],
        cancel,
    )
    .await?;

    for row in &result.rows {
        let column_name = row.text_or_empty("name");
        let data_type = row.text_or_empty("data_type").to_ascii_lowercase();
        let extra = row.text_or_empty("extra").to_ascii_lowercase();

        let mut column = column_from_catalog_type(
            schema,
            &column_name,
            &row.text_or_empty("column_type"),
            &data_type,
        );
        column.table_name = table.table_name.clone();
        column.is_nullable = row.flag("is_nullable");
        column.is_auto_increment = extra.contains("auto_increment");

        if let Some(expression) = default_expression(row.text("column_default"), &extra, &data_type)
        {
            table.default_constraints.push(DefaultConstraint::new(
                table.table_name.as_str(),
                column_name.as_str(),
                expression,
            ));
        }
        table.columns.push(column);
    }
    Ok(())
}

/// Type a column from `COLUMN_TYPE`. Enums, sets and anything the type map
/// cannot reverse come back untyped with the catalog text as their MySQL
/// override, so the value list survives.
pub(super) fn column_from_catalog_type(
    schema: &MySqlSchema,
    column_name: &str,
    column_type: &str,
    data_type: &str,
) -> Column {
    let reversed = match data_type {
        "enum" | "set" => None,
        _ => schema.type_map().reverse(column_type).ok(),
    };
    let Some(descriptor) = reversed else {
        return Column::untyped(column_name).with_type_override(Dialect::MySql, column_type);
    };

    let mut column = Column::new(column_name, descriptor.host_type().clone());
    column.length = descriptor.length;
    column.precision = descriptor.precision;
    column.scale = descriptor.scale;
    column.is_unicode = descriptor.is_unicode;
    column.is_fixed_length = descriptor.is_fixed_length;
    column
}

/// Turn `COLUMN_DEFAULT` back into an expression.
///
/// MySQL stores literal defaults unquoted and marks expressions with
/// `DEFAULT_GENERATED` in `EXTRA`; MariaDB quotes string literals itself and
/// reports a missing default as the text `NULL`.
pub(super) fn default_expression(raw: Option<String>, extra: &str, data_type: &str) -> Option<String> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return None;
    }

    if extra.contains("default_generated") {
        let lower = trimmed.to_ascii_lowercase();
        let bare_allowed = ["current_timestamp", "now(", "localtime"]
            .iter()
            .any(|prefix| lower.starts_with(prefix));
        if bare_allowed || trimmed.starts_with('(') {
            return Some(trimmed.to_string());
        }
        return Some(format!("({})", trimmed));
    }

    if NUMERIC_TYPES.contains(&data_type) || trimmed.starts_with('\'') {
        return Some(trimmed.to_string());
    }
    let lower = trimmed.to_ascii_lowercase();
    if matches!(data_type, "timestamp" | "datetime")
        && (lower.starts_with("current_timestamp") || lower.starts_with("now("))
    {
        return Some(trimmed.to_string());
    }
    Some(format!("'{}'", raw.replace('\'', "''")))
}

async fn load_foreign_keys(
    db: &dyn SqlExecutor,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT k.CONSTRAINT_NAME AS name, k.COLUMN_NAME AS column_name, \
                k.REFERENCED_TABLE_NAME AS referenced_table, \
                k.REFERENCED_COLUMN_NAME AS referenced_column, \
                r.UPDATE_RULE AS on_update, r.DELETE_RULE AS on_delete \
         FROM information_schema.KEY_COLUMN_USAGE k \
         JOIN information_schema.REFERENTIAL_CONSTRAINTS r \
              ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
             AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
             AND r.TABLE_NAME = k.TABLE_NAME \
         WHERE k.TABLE_SCHEMA = DATABASE() AND k.TABLE_NAME = ? \
           AND k.REFERENCED_TABLE_NAME IS NOT NULL \
         ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION",
        &[Value::from(table.table_name.as_str())],
        cancel,
    )
    .await?;

    for rows in group_by_name(&result.rows) {
        let first = rows[0];
        let columns: Vec<String> = rows.iter().filter_map(|r| r.text("column_name")).collect();
        let referenced: Vec<String> =
            rows.iter().filter_map(|r| r.text("referenced_column")).collect();
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        let referenced_refs: Vec<&str> = referenced.iter().map(String::as_str).collect();

        table.foreign_key_constraints.push(
            ForeignKeyConstraint::new(
                table.table_name.as_str(),
                &column_refs,
                first.text_or_empty("referenced_table"),
                &referenced_refs,
            )
            .named(first.text_or_empty("name"))
            .on_delete(ReferentialAction::from_catalog(&first.text_or_empty("on_delete")))
            .on_update(ReferentialAction::from_catalog(&first.text_or_empty("on_update"))),
        );
    }
    Ok(())
}

/// What a unique index in `STATISTICS` stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum UniqueKind {
    Constraint,
    Index,
}

/// Unique constraints and unique indexes are one object in MySQL. Names
/// following the `ix_` template were created as indexes; everything else is
/// read as a constraint.
pub(super) fn unique_kind(index_name: &str) -> UniqueKind {
    let is_index = index_name
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("ix_"));
    if is_index {
        UniqueKind::Index
    } else {
        UniqueKind::Constraint
    }
}

/// Primary key, unique constraints and indexes from `STATISTICS`. Indexes
/// MySQL created for a foreign key carry the key's name and are left out.
async fn load_keys(db: &dyn SqlExecutor, table: &mut Table, cancel: &CancellationToken) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT INDEX_NAME AS name, NON_UNIQUE AS non_unique, \
                COLUMN_NAME AS column_name, COLLATION AS collation \
         FROM information_schema.STATISTICS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
         ORDER BY INDEX_NAME, SEQ_IN_INDEX",
        &[Value::from(table.table_name.as_str())],
        cancel,
    )
    .await?;

    let foreign_keys: HashSet<String> = table
        .foreign_key_constraints
        .iter()
        .map(|fk| fk.constraint_name.to_ascii_lowercase())
        .collect();
    let table_name = table.table_name.clone();

    for rows in group_by_name(&result.rows) {
        let first = rows[0];
        let name = first.text_or_empty("name");
        if foreign_keys.contains(&name.to_ascii_lowercase()) {
            continue;
        }

        let mut columns = Vec::with_capacity(rows.len());
        for key in &rows {
            match key.text("column_name") {
                Some(column_name) if key.text_or_empty("collation") == "D" => {
                    columns.push(OrderedColumn::desc(column_name))
                }
                Some(column_name) => columns.push(OrderedColumn::asc(column_name)),
                None => {
                    columns.clear();
                    break;
                }
            }
        }
        if columns.is_empty() {
            tracing::debug!(index = %name, "skipping functional index");
            continue;
        }

        let is_unique = first.int("non_unique") == Some(0);
        if name == "PRIMARY" {
            table.primary_key = Some(
                PrimaryKeyConstraint::new(table_name.as_str(), columns)
                    .named(naming::primary_key(&table_name)),
            );
        } else if is_unique && unique_kind(&name) == UniqueKind::Constraint {
            table
                .unique_constraints
                .push(UniqueConstraint::new(table_name.as_str(), columns).named(name));
        } else {
            let mut index = Index::new(table_name.as_str(), columns).named(name);
            if is_unique {
                index = index.unique();
            }
            table.indexes.push(index);
        }
    }
    Ok(())
}

async fn load_checks(db: &dyn SqlExecutor, table: &mut Table, cancel: &CancellationToken) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT tc.CONSTRAINT_NAME AS name, cc.CHECK_CLAUSE AS definition \
         FROM information_schema.TABLE_CONSTRAINTS tc \
         JOIN information_schema.CHECK_CONSTRAINTS cc \
              ON cc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA \
             AND cc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
         WHERE tc.TABLE_SCHEMA = DATABASE() AND tc.TABLE_NAME = ? \
           AND tc.CONSTRAINT_TYPE = 'CHECK' \
         ORDER BY tc.CONSTRAINT_NAME",
        &[Value::from(table.table_name.as_str())],
        cancel,
    )
    .await?;

    for row in &result.rows {
        let name = row.text_or_empty("name");
        // the catalog keeps no owning column; the generated name gives it away
        let column = table
            .columns
            .iter()
            .map(|c| c.column_name.as_str())
            .find(|c| naming::check_constraint(&table.table_name, Some(c)) == name);
        let check = CheckConstraint::new(
            table.table_name.as_str(),
            column,
            check_expression(&row.text_or_empty("definition")),
        )
        .named(name);
        table.check_constraints.push(check);
    }
    Ok(())
}

/// `CHECK_CLAUSE` wraps the expression in one pair of parentheses.
pub(super) fn check_expression(clause: &str) -> String {
    let body = clause.trim();
    match body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) if balanced(inner) => inner.trim().to_string(),
        _ => body.to_string(),
    }
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Consecutive rows sharing a `name`, in query order.
fn group_by_name(rows: &[Row]) -> Vec<Vec<&Row>> {
    let mut groups: Vec<Vec<&Row>> = Vec::new();
    for row in rows {
        let name = row.text_or_empty("name");
        match groups.last_mut() {
            Some(group) if group[0].text_or_empty("name") == name => group.push(row),
            _ => groups.push(vec![row]),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schemata_core::HostType;

    #[test]
    fn literal_defaults_are_quoted_by_type() {
        assert_eq!(
            default_expression(Some("0".into()), "", "int").as_deref(),
            Some("0")
        );
        assert_eq!(
            default_expression(Some("none".into()), "", "varchar").as_deref(),
            Some("'none'")
        );
        assert_eq!(
            default_expression(Some("it's".into()), "", "varchar").as_deref(),
            Some("'it''s'")
        );
        assert_eq!(
            default_expression(Some("'quoted'".into()), "", "varchar").as_deref(),
            Some("'quoted'")
        );
        assert_eq!(default_expression(Some("NULL".into()), "", "varchar"), None);
        assert_eq!(default_expression(None, "", "int"), None);
    }

    #[test]
    fn generated_defaults_keep_the_expression() {
        assert_eq!(
            default_expression(Some("CURRENT_TIMESTAMP".into()), "default_generated", "datetime")
                .as_deref(),
            Some("CURRENT_TIMESTAMP")
        );
        assert_eq!(
            default_expression(Some("uuid()".into()), "default_generated", "char").as_deref(),
            Some("(uuid())")
        );
        assert_eq!(
            default_expression(Some("current_timestamp()".into()), "", "timestamp").as_deref(),
            Some("current_timestamp()")
        );
    }

    #[test]
    fn check_clauses_lose_one_wrapper() {
        assert_eq!(check_expression("(`qty` >= 0)"), "`qty` >= 0");
        assert_eq!(check_expression("((`a` > 0) and (`b` > 0))"), "(`a` > 0) and (`b` > 0)");
        assert_eq!(check_expression("(`a` > 0) and (`b` > 0)"), "(`a` > 0) and (`b` > 0)");
    }

    #[test]
    fn unique_indexes_split_by_name() {
        assert_eq!(unique_kind("uc_users_email"), UniqueKind::Constraint);
        assert_eq!(unique_kind("email"), UniqueKind::Constraint);
        assert_eq!(unique_kind("IX_users_email"), UniqueKind::Index);
        assert_eq!(unique_kind("ix"), UniqueKind::Constraint);
    }

    #[test]
    fn catalog_types_reverse_with_facets() {
        let schema = MySqlSchema::new();
        let name = column_from_catalog_type(&schema, "name", "varchar(100)", "varchar");
        assert_eq!(name.host_type, Some(HostType::String));
        assert_eq!(name.length, Some(100));

        let flag = column_from_catalog_type(&schema, "active", "tinyint(1)", "tinyint");
        assert_eq!(flag.host_type, Some(HostType::Bool));

        let count = column_from_catalog_type(&schema, "hits", "int unsigned", "int");
        assert_eq!(count.host_type, Some(HostType::U32));
    }

    #[test]
    fn enums_keep_their_value_list() {
        let schema = MySqlSchema::new();
        let mood = column_from_catalog_type(&schema, "mood", "enum('happy','sad')", "enum");
        assert_eq!(mood.host_type, None);
        assert_eq!(
            mood.dialect_types.get(&Dialect::MySql).map(String::as_str),
            Some("enum('happy','sad')")
        );
    }
}
