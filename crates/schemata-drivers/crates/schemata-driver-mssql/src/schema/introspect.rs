//! Catalog reads through the `sys` views

use super::MssqlSchema;
use schemata_core::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKeyConstraint, Index, OrderedColumn,
    PrimaryKeyConstraint, ReferentialAction, Table, UniqueConstraint, View,
};
use schemata_core::schema::DialectSchema;
use schemata_core::{CancellationToken, Dialect, Result, Row, SqlExecutor, Value, cancellation};

pub(super) async fn schema_names(
    db: &dyn SqlExecutor,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    // ids from 16384 up are the fixed database roles
    let result = cancellation::query(
        db,
        "SELECT name FROM sys.schemas \
         WHERE schema_id < 16384 AND name NOT IN ('sys', 'INFORMATION_SCHEMA', 'guest') \
         ORDER BY name",
        &[],
        cancel,
    )
    .await?;
    Ok(result.rows.iter().filter_map(|row| row.text("name")).collect())
}

pub(super) async fn table_names(
    db: &dyn SqlExecutor,
    schema_name: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let result = cancellation::query(
        db,
        "SELECT t.name AS name FROM sys.tables t \
         JOIN sys.schemas s ON s.schema_id = t.schema_id \
         WHERE s.name = @P1 AND t.is_ms_shipped = 0 \
         ORDER BY t.name",
        &[Value::from(schema_name)],
        cancel,
    )
    .await?;
    Ok(result.rows.iter().filter_map(|row| row.text("name")).collect())
}

pub(super) async fn views(
    db: &dyn SqlExecutor,
    schema_name: &str,
    cancel: &CancellationToken,
) -> Result<Vec<View>> {
    let result = cancellation::query(
        db,
        "SELECT v.name AS name, m.definition AS definition \
         FROM sys.views v \
         JOIN sys.schemas s ON s.schema_id = v.schema_id \
         JOIN sys.sql_modules m ON m.object_id = v.object_id \
         WHERE s.name = @P1 AND v.is_ms_shipped = 0 \
         ORDER BY v.name",
        &[Value::from(schema_name)],
        cancel,
    )
    .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.text("name")?;
            let body = view_body(&row.text_or_empty("definition"));
            Some(View::new(name, body).in_schema(Some(schema_name)))
        })
        .collect())
}

/// The query part of a stored `CREATE VIEW` text: everything after the first
/// top-level `AS` that follows `VIEW`. Brackets, quotes, comments and the
/// optional column list are skipped over.
pub(super) fn view_body(definition: &str) -> String {
    let text = definition.trim();
    let bytes = text.as_bytes();
    let mut seen_view = false;
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
                continue;
            }
            quote @ (b'\'' | b'"' | b'[') => {
                let close = if quote == b'[' { b']' } else { quote };
                i += 1;
                while i < bytes.len() && bytes[i] != close {
                    i += 1;
                }
                i += 1;
                continue;
            }
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &text[start..i];
                if depth == 0 {
                    if !seen_view && word.eq_ignore_ascii_case("view") {
                        seen_view = true;
                    } else if seen_view && word.eq_ignore_ascii_case("as") {
                        return text[i..].trim().trim_end_matches(';').trim_end().to_string();
                    }
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    text.trim_end_matches(';').trim_end().to_string()
}

pub(super) async fn table(
    schema: &MssqlSchema,
    db: &dyn SqlExecutor,
    schema_name: &str,
    table_name: &str,
    cancel: &CancellationToken,
) -> Result<Option<Table>> {
    // exact spelling wins over a case-insensitive match
    let found = cancellation::query(
        db,
        "SELECT TOP 1 t.object_id AS object_id, t.name AS name \
         FROM sys.tables t \
         JOIN sys.schemas s ON s.schema_id = t.schema_id \
         WHERE s.name = @P1 AND LOWER(t.name) = LOWER(@P2) AND t.is_ms_shipped = 0 \
         ORDER BY CASE WHEN t.name = @P2 COLLATE Latin1_General_BIN2 THEN 0 ELSE 1 END",
        &[Value::from(schema_name), Value::from(table_name)],
        cancel,
    )
    .await?;
    let Some(row) = found.rows.first() else {
        return Ok(None);
    };
    let Some(object_id) = row.int("object_id") else {
        return Ok(None);
    };
    let name = row.text_or_empty("name");

    let mut table = Table::new(name.clone()).in_schema(Some(schema_name));
    load_columns(schema, db, object_id, &mut table, cancel).await?;
    load_keys(db, object_id, &mut table, cancel).await?;
    load_indexes(db, object_id, &mut table, cancel).await?;
    load_foreign_keys(db, object_id, &mut table, cancel).await?;
    load_checks(db, object_id, &mut table, cancel).await?;

    tracing::debug!(
        schema = %schema_name,
        table = %name,
        columns = table.columns.len(),
        indexes = table.indexes.len(),
        foreign_keys = table.foreign_key_constraints.len(),
        "introspected mssql table"
    );
    Ok(Some(table))
}

async fn load_columns(
    schema: &MssqlSchema,
    db: &dyn SqlExecutor,
    object_id: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT c.name AS name, \
                TYPE_NAME(c.user_type_id) AS type_name, \
                ty.is_user_defined AS is_user_defined, \
                c.max_length AS max_length, \
                c.precision AS numeric_precision, \
                c.scale AS numeric_scale, \
                c.is_nullable AS is_nullable, \
                c.is_identity AS is_identity, \
                c.is_computed AS is_computed, \
                dc.name AS default_name, \
                dc.definition AS default_definition \
         FROM sys.columns c \
         JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
         LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id \
         WHERE c.object_id = @P1 \
         ORDER BY c.column_id",
        &[Value::Int64(object_id)],
        cancel,
    )
    .await?;

    for row in &result.rows {
        let column_name = row.text_or_empty("name");
        let type_name = row.text_or_empty("type_name");
        let mut column = if row.flag("is_user_defined") {
            Column::untyped(column_name.as_str()).with_type_override(Dialect::SqlServer, type_name)
        } else {
            let declared = catalog_type_name(
                &type_name,
                row.int("max_length").unwrap_or(0),
                row.int("numeric_precision").unwrap_or(0),
                row.int("numeric_scale").unwrap_or(0),
            );
            column_from_catalog_type(schema, &column_name, &declared)
        };
        column.schema_name = table.schema_name.clone();
        column.table_name = table.table_name.clone();
        column.is_nullable = row.flag("is_nullable");
        column.is_auto_increment = row.flag("is_identity");

        if !row.flag("is_computed")
            && let Some(definition) = row.text("default_definition")
        {
            let mut default = DefaultConstraint::new(
                table.table_name.as_str(),
                column_name.as_str(),
                default_expression(&definition),
            )
            .in_schema(table.schema_name.as_deref());
            if let Some(name) = row.text("default_name") {
                default = default.named(name);
            }
            table.default_constraints.push(default);
        }
        table.columns.push(column);
    }
    Ok(())
}

/// Rebuild a declared type from `sys.columns` facets. `max_length` is in
/// bytes, so n-types are halved, and -1 means `(max)`.
pub(super) fn catalog_type_name(type_name: &str, max_length: i64, precision: i64, scale: i64) -> String {
    let name = type_name.to_ascii_lowercase();
    let sized = |length: i64| {
        if max_length == -1 {
            format!("{}(max)", name)
        } else {
            format!("{}({})", name, length)
        }
    };
    match name.as_str() {
        "varchar" | "char" | "varbinary" | "binary" => sized(max_length),
        "nvarchar" | "nchar" => sized(max_length / 2),
        "decimal" | "numeric" => format!("{}({},{})", name, precision, scale),
        "float" if precision <= 24 => "real".to_string(),
        "time" | "datetime2" | "datetimeoffset" if scale != 7 => format!("{}({})", name, scale),
        _ => name,
    }
}

/// Type a column from its rebuilt declaration. Anything the type map cannot
/// reverse comes back untyped, carrying the catalog text as its override.
pub(super) fn column_from_catalog_type(schema: &MssqlSchema, column_name: &str, declared: &str) -> Column {
    let Ok(descriptor) = schema.type_map().reverse(declared) else {
        return Column::untyped(column_name).with_type_override(Dialect::SqlServer, declared);
    };

    let mut column = Column::new(column_name, descriptor.host_type().clone());
    column.length = descriptor.length;
    column.precision = descriptor.precision;
    column.scale = descriptor.scale;
    column.is_unicode = descriptor.is_unicode;
    column.is_fixed_length = descriptor.is_fixed_length;
    column
}

/// The catalog wraps defaults in parentheses, often twice: `((0))`.
pub(super) fn default_expression(definition: &str) -> String {
    let mut current = definition.trim();
    while let Some(inner) = unwrap_parens(current) {
        current = inner.trim();
    }
    current.to_string()
}

/// Check definitions carry one wrapping pair: `([qty]>=(0))`.
pub(super) fn check_expression(definition: &str) -> String {
    let body = definition.trim();
    unwrap_parens(body).unwrap_or(body).trim().to_string()
}

fn unwrap_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    balanced(inner).then_some(inner)
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    let mut in_literal = false;
    for c in text.chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => {
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

/// Primary key and unique constraints with their column order.
async fn load_keys(
    db: &dyn SqlExecutor,
    object_id: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT kc.name AS name, kc.type AS kind, col.name AS column_name, \
                ic.is_descending_key AS is_descending \
         FROM sys.key_constraints kc \
         JOIN sys.index_columns ic \
              ON ic.object_id = kc.parent_object_id AND ic.index_id = kc.unique_index_id \
         JOIN sys.columns col ON col.object_id = ic.object_id AND col.column_id = ic.column_id \
         WHERE kc.parent_object_id = @P1 AND ic.is_included_column = 0 \
         ORDER BY kc.name, ic.key_ordinal",
        &[Value::Int64(object_id)],
        cancel,
    )
    .await?;

    let table_name = table.table_name.clone();
    let schema_name = table.schema_name.clone();
    let schema = schema_name.as_deref();

    for rows in group_by_name(&result.rows) {
        let first = rows[0];
        let name = first.text_or_empty("name");
        let columns = ordered_columns(&rows);
        match first.text_or_empty("kind").trim() {
            "PK" => {
                table.primary_key = Some(
                    PrimaryKeyConstraint::new(table_name.as_str(), columns)
                        .named(name)
                        .in_schema(schema),
                );
            }
            "UQ" => table.unique_constraints.push(
                UniqueConstraint::new(table_name.as_str(), columns)
                    .named(name)
                    .in_schema(schema),
            ),
            _ => {}
        }
    }
    Ok(())
}

/// Indexes that back no constraint. Filtered indexes and indexes with
/// included columns have no model counterpart and are left out.
async fn load_indexes(
    db: &dyn SqlExecutor,
    object_id: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT i.name AS name, i.is_unique AS is_unique, i.has_filter AS has_filter, \
                col.name AS column_name, ic.is_descending_key AS is_descending, \
                ic.is_included_column AS is_included \
         FROM sys.indexes i \
         JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
         JOIN sys.columns col ON col.object_id = ic.object_id AND col.column_id = ic.column_id \
         WHERE i.object_id = @P1 AND i.name IS NOT NULL AND i.type IN (1, 2) \
           AND i.is_primary_key = 0 AND i.is_unique_constraint = 0 \
         ORDER BY i.name, ic.is_included_column, ic.key_ordinal",
        &[Value::Int64(object_id)],
        cancel,
    )
    .await?;

    let table_name = table.table_name.clone();
    let schema_name = table.schema_name.clone();

    for rows in group_by_name(&result.rows) {
        let first = rows[0];
        let name = first.text_or_empty("name");
        if first.flag("has_filter") || rows.iter().any(|r| r.flag("is_included")) {
            tracing::debug!(index = %name, "skipping filtered or covering index");
            continue;
        }
        let mut index = Index::new(table_name.as_str(), ordered_columns(&rows))
            .named(name)
            .in_schema(schema_name.as_deref());
        if first.flag("is_unique") {
            index = index.unique();
        }
        table.indexes.push(index);
    }
    Ok(())
}

async fn load_foreign_keys(
    db: &dyn SqlExecutor,
    object_id: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT fk.name AS name, pc.name AS column_name, \
                rs.name AS referenced_schema, rt.name AS referenced_table, \
                rc.name AS referenced_column, \
                fk.delete_referential_action_desc AS on_delete, \
                fk.update_referential_action_desc AS on_update \
         FROM sys.foreign_keys fk \
         JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
         JOIN sys.columns pc \
              ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
         JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id \
         JOIN sys.schemas rs ON rs.schema_id = rt.schema_id \
         JOIN sys.columns rc \
              ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
         WHERE fk.parent_object_id = @P1 \
         ORDER BY fk.name, fkc.constraint_column_id",
        &[Value::Int64(object_id)],
        cancel,
    )
    .await?;

    let table_name = table.table_name.clone();
    let schema_name = table.schema_name.clone();
    let schema = schema_name.as_deref();

    for rows in group_by_name(&result.rows) {
        let first = rows[0];
        let columns: Vec<String> = rows.iter().filter_map(|r| r.text("column_name")).collect();
        let referenced: Vec<String> =
            rows.iter().filter_map(|r| r.text("referenced_column")).collect();
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        let referenced_refs: Vec<&str> = referenced.iter().map(String::as_str).collect();
        let referenced_schema = first
            .text("referenced_schema")
            .filter(|s| Some(s.as_str()) != schema);

        table.foreign_key_constraints.push(
            ForeignKeyConstraint::new(
                table_name.as_str(),
                &column_refs,
                first.text_or_empty("referenced_table"),
                &referenced_refs,
            )
            .named(first.text_or_empty("name"))
            .in_schema(schema)
            .referencing_schema(referenced_schema.as_deref())
            .on_delete(ReferentialAction::from_catalog(&first.text_or_empty("on_delete")))
            .on_update(ReferentialAction::from_catalog(&first.text_or_empty("on_update"))),
        );
    }
    Ok(())
}

async fn load_checks(
    db: &dyn SqlExecutor,
    object_id: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT cc.name AS name, cc.definition AS definition, col.name AS column_name \
         FROM sys.check_constraints cc \
         LEFT JOIN sys.columns col \
              ON col.object_id = cc.parent_object_id AND col.column_id = cc.parent_column_id \
         WHERE cc.parent_object_id = @P1 \
         ORDER BY cc.name",
        &[Value::Int64(object_id)],
        cancel,
    )
    .await?;

    for row in &result.rows {
        let column = row.text("column_name");
        table.check_constraints.push(
            CheckConstraint::new(
                table.table_name.as_str(),
                column.as_deref(),
                check_expression(&row.text_or_empty("definition")),
            )
            .named(row.text_or_empty("name"))
            .in_schema(table.schema_name.as_deref()),
        );
    }
    Ok(())
}

fn ordered_columns(rows: &[&Row]) -> Vec<OrderedColumn> {
    rows.iter()
        .filter_map(|row| {
            let name = row.text("column_name")?;
            Some(if row.flag("is_descending") {
                OrderedColumn::desc(name)
            } else {
                OrderedColumn::asc(name)
            })
        })
        .collect()
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
    fn catalog_facets_rebuild_the_declaration() {
        assert_eq!(catalog_type_name("nvarchar", 200, 0, 0), "nvarchar(100)");
        assert_eq!(catalog_type_name("nvarchar", -1, 0, 0), "nvarchar(max)");
        assert_eq!(catalog_type_name("varbinary", 16, 0, 0), "varbinary(16)");
        assert_eq!(catalog_type_name("decimal", 9, 10, 2), "decimal(10,2)");
        assert_eq!(catalog_type_name("float", 8, 53, 0), "float");
        assert_eq!(catalog_type_name("float", 4, 24, 0), "real");
        assert_eq!(catalog_type_name("datetime2", 8, 27, 7), "datetime2");
        assert_eq!(catalog_type_name("datetime2", 6, 19, 0), "datetime2(0)");
        assert_eq!(catalog_type_name("INT", 4, 10, 0), "int");
    }

    #[test]
    fn defaults_lose_every_wrapping_pair() {
        assert_eq!(default_expression("((0))"), "0");
        assert_eq!(default_expression("(getdate())"), "getdate()");
        assert_eq!(default_expression("('a(b')"), "'a(b'");
        assert_eq!(default_expression("((1)+(2))"), "(1)+(2)");
    }

    #[test]
    fn checks_lose_one_wrapping_pair() {
        assert_eq!(check_expression("([qty]>=(0))"), "[qty]>=(0)");
        assert_eq!(check_expression("([a]>(0)) AND ([b]>(0))"), "([a]>(0)) AND ([b]>(0))");
    }

    #[test]
    fn view_body_starts_after_the_header() {
        assert_eq!(
            view_body("CREATE VIEW [dbo].[v1] AS SELECT 1 AS one;"),
            "SELECT 1 AS one"
        );
        assert_eq!(
            view_body(
                "-- report view\nCREATE VIEW dbo.[as] (a, b) WITH SCHEMABINDING\nAS\n  SELECT x AS a, y AS b FROM dbo.t"
            ),
            "SELECT x AS a, y AS b FROM dbo.t"
        );
        assert_eq!(
            view_body("/* AS */ create view v as select 'view as' as c"),
            "select 'view as' as c"
        );
    }

    #[test]
    fn catalog_types_reverse_with_facets() {
        let schema = MssqlSchema::new();
        let name = column_from_catalog_type(&schema, "name", "nvarchar(100)");
        assert_eq!(name.host_type, Some(HostType::String));
        assert_eq!(name.length, Some(100));
        assert_eq!(name.is_unicode, Some(true));

        let flag = column_from_catalog_type(&schema, "active", "bit");
        assert_eq!(flag.host_type, Some(HostType::Bool));

        let odd = column_from_catalog_type(&schema, "node", "hierarchyid");
        assert_eq!(odd.host_type, Some(HostType::String));
    }

    #[test]
    fn unknown_catalog_types_keep_their_text() {
        let schema = MssqlSchema::new();
        let column = column_from_catalog_type(&schema, "shape", "vector(3)");
        assert_eq!(column.host_type, None);
        assert_eq!(
            column
                .dialect_types
                .get(&Dialect::SqlServer)
                .map(String::as_str),
            Some("vector(3)")
        );
    }
}
