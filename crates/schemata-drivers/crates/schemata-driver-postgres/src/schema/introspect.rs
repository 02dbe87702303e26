//! Catalog reads through `pg_catalog`
//!
//! The table is resolved to its oid once; every later query filters on it.

use super::PostgresSchema;
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
    let result = cancellation::query(
        db,
        "SELECT nspname::text AS name FROM pg_catalog.pg_namespace \
         WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema' \
         ORDER BY nspname",
        &[],
        cancel,
    )
    .await?;
    Ok(result.rows.iter().filter_map(|row| row.text("name")).collect())
}

pub(super) async fn table_names(
    db: &dyn SqlExecutor,
    schema: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let result = cancellation::query(
        db,
        "SELECT c.relname::text AS name \
         FROM pg_catalog.pg_class c \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = $1::text AND c.relkind IN ('r', 'p') \
         ORDER BY c.relname",
        &[Value::from(schema)],
        cancel,
    )
    .await?;
    Ok(result.rows.iter().filter_map(|row| row.text("name")).collect())
}

pub(super) async fn views(
    db: &dyn SqlExecutor,
    schema: &str,
    cancel: &CancellationToken,
) -> Result<Vec<View>> {
    let result = cancellation::query(
        db,
        "SELECT c.relname::text AS name, pg_catalog.pg_get_viewdef(c.oid, true) AS definition \
         FROM pg_catalog.pg_class c \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = $1::text AND c.relkind = 'v' \
         ORDER BY c.relname",
        &[Value::from(schema)],
        cancel,
    )
    .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.text("name")?;
            let definition = row.text_or_empty("definition");
            let definition = definition.trim().trim_end_matches(';').trim_end();
            Some(View::new(name, definition).in_schema(Some(schema)))
        })
        .collect())
}

pub(super) async fn table(
    schema: &PostgresSchema,
    db: &dyn SqlExecutor,
    schema_name: &str,
    table_name: &str,
    cancel: &CancellationToken,
) -> Result<Option<Table>> {
    // exact spelling wins over a case-insensitive match
    let found = cancellation::query(
        db,
        "SELECT c.oid::bigint AS oid, c.relname::text AS name \
         FROM pg_catalog.pg_class c \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = $1::text AND c.relkind IN ('r', 'p') \
           AND lower(c.relname) = lower($2::text) \
         ORDER BY (c.relname = $2::text) DESC \
         LIMIT 1",
        &[Value::from(schema_name), Value::from(table_name)],
        cancel,
    )
    .await?;
    let Some(row) = found.rows.first() else {
        return Ok(None);
    };
    let Some(oid) = row.int("oid") else {
        return Ok(None);
    };
    let name = row.text_or_empty("name");

    let mut table = Table::new(name.clone()).in_schema(Some(schema_name));
    load_columns(schema, db, oid, &mut table, cancel).await?;
    load_constraints(db, oid, &mut table, cancel).await?;
    load_indexes(db, oid, &mut table, cancel).await?;

    tracing::debug!(
        schema = %schema_name,
        table = %name,
        columns = table.columns.len(),
        indexes = table.indexes.len(),
        foreign_keys = table.foreign_key_constraints.len(),
        "introspected postgres table"
    );
    Ok(Some(table))
}

async fn load_columns(
    schema: &PostgresSchema,
    db: &dyn SqlExecutor,
    oid: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT a.attname::text AS name, \
                pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type, \
                a.attnotnull AS not_null, \
                a.attidentity::text AS identity, \
                a.attgenerated::text AS generated, \
                pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS default_expression, \
                t.typtype::text AS type_kind \
         FROM pg_catalog.pg_attribute a \
         JOIN pg_catalog.pg_type t ON t.oid = a.atttypid \
         LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
         WHERE a.attrelid = $1::bigint::oid AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY a.attnum",
        &[Value::Int64(oid)],
        cancel,
    )
    .await?;

    for row in &result.rows {
        let column_name = row.text_or_empty("name");
        let mut column = column_from_catalog_type(
            schema,
            &column_name,
            &row.text_or_empty("data_type"),
            &row.text_or_empty("type_kind"),
        );
        column.schema_name = table.schema_name.clone();
        column.table_name = table.table_name.clone();
        column.is_nullable = !row.flag("not_null");

        let identity = !row.text_or_empty("identity").is_empty();
        let generated = !row.text_or_empty("generated").is_empty();
        let default = row.text("default_expression");
        let sequence_default = default.as_deref().is_some_and(is_sequence_default);
        column.is_auto_increment = identity || sequence_default;

        if let Some(expression) = default
            && !sequence_default
            && !generated
        {
            table.default_constraints.push(
                DefaultConstraint::new(table.table_name.as_str(), column_name.as_str(), expression)
                    .in_schema(table.schema_name.as_deref()),
            );
        }
        table.columns.push(column);
    }
    Ok(())
}

/// Type a column from `format_type` output. Enums, domains and anything the
/// type map cannot reverse come back untyped, carrying the catalog text as
/// their PostgreSQL override.
pub(super) fn column_from_catalog_type(
    schema: &PostgresSchema,
    column_name: &str,
    data_type: &str,
    type_kind: &str,
) -> Column {
    let reversed = match type_kind {
        "e" | "d" => None,
        _ => schema.type_map().reverse(data_type).ok(),
    };
    let Some(descriptor) = reversed else {
        return Column::untyped(column_name).with_type_override(Dialect::PostgreSql, data_type);
    };

    let mut column = Column::new(column_name, descriptor.host_type().clone());
    column.length = descriptor.length;
    column.precision = descriptor.precision;
    column.scale = descriptor.scale;
    column.is_unicode = descriptor.is_unicode;
    column.is_fixed_length = descriptor.is_fixed_length;
    column
}

fn is_sequence_default(expression: &str) -> bool {
    expression.trim_start().to_ascii_lowercase().starts_with("nextval(")
}

async fn load_constraints(
    db: &dyn SqlExecutor,
    oid: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = cancellation::query(
        db,
        "SELECT con.conname::text AS name, \
                con.contype::text AS kind, \
                pg_catalog.pg_get_constraintdef(con.oid) AS definition, \
                con.confdeltype::text AS on_delete, \
                con.confupdtype::text AS on_update, \
                rn.nspname::text AS referenced_schema, \
                rc.relname::text AS referenced_table, \
                a.attname::text AS column_name, \
                ra.attname::text AS referenced_column \
         FROM pg_catalog.pg_constraint con \
         LEFT JOIN pg_catalog.pg_class rc ON rc.oid = con.confrelid \
         LEFT JOIN pg_catalog.pg_namespace rn ON rn.oid = rc.relnamespace \
         LEFT JOIN LATERAL unnest(con.conkey, con.confkey) \
              WITH ORDINALITY AS k(attnum, refnum, position) ON true \
         LEFT JOIN pg_catalog.pg_attribute a \
              ON a.attrelid = con.conrelid AND a.attnum = k.attnum \
         LEFT JOIN pg_catalog.pg_attribute ra \
              ON ra.attrelid = con.confrelid AND ra.attnum = k.refnum \
         WHERE con.conrelid = $1::bigint::oid AND con.contype IN ('p', 'u', 'f', 'c') \
         ORDER BY con.conname, k.position",
        &[Value::Int64(oid)],
        cancel,
    )
    .await?;

    let table_name = table.table_name.clone();
    let schema_name = table.schema_name.clone();
    let schema = schema_name.as_deref();

    for rows in group_by_name(&result.rows) {
        let first = rows[0];
        let name = first.text_or_empty("name");
        let columns: Vec<String> = rows.iter().filter_map(|r| r.text("column_name")).collect();
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();

        match first.text_or_empty("kind").as_str() {
            "p" => {
                table.primary_key = Some(
                    PrimaryKeyConstraint::new(table_name.as_str(), column_refs.iter().copied())
                        .named(name)
                        .in_schema(schema),
                );
            }
            "u" => table.unique_constraints.push(
                UniqueConstraint::new(table_name.as_str(), column_refs.iter().copied())
                    .named(name)
                    .in_schema(schema),
            ),
            "f" => {
                let referenced: Vec<String> =
                    rows.iter().filter_map(|r| r.text("referenced_column")).collect();
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
                    .named(name)
                    .in_schema(schema)
                    .referencing_schema(referenced_schema.as_deref())
                    .on_delete(ReferentialAction::from_catalog(&first.text_or_empty("on_delete")))
                    .on_update(ReferentialAction::from_catalog(&first.text_or_empty("on_update"))),
                );
            }
            "c" => {
                let definition = first.text_or_empty("definition");
                let column = match column_refs.as_slice() {
                    [single] => Some(*single),
                    _ => None,
                };
                table.check_constraints.push(
                    CheckConstraint::new(table_name.as_str(), column, check_expression(&definition))
                        .named(name)
                        .in_schema(schema),
                );
            }
            _ => {}
        }
    }
    Ok(())
}

async fn load_indexes(
    db: &dyn SqlExecutor,
    oid: i64,
    table: &mut Table,
    cancel: &CancellationToken,
) -> Result<()> {
    // indexes backing a primary key, unique or exclusion constraint are
    // reported as those constraints
    let result = cancellation::query(
        db,
        "SELECT i.relname::text AS name, \
                ix.indisunique AS is_unique, \
                (ix.indpred IS NOT NULL) AS is_partial, \
                a.attname::text AS column_name, \
                (ix.indoption[(k.position - 1)::int]::int & 1) = 1 AS descending \
         FROM pg_catalog.pg_index ix \
         JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid \
         CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, position) \
         LEFT JOIN pg_catalog.pg_attribute a \
              ON a.attrelid = ix.indrelid AND a.attnum = k.attnum AND k.attnum > 0 \
         WHERE ix.indrelid = $1::bigint::oid \
           AND k.position <= ix.indnkeyatts \
           AND NOT EXISTS ( \
               SELECT 1 FROM pg_catalog.pg_constraint con \
               WHERE con.conindid = ix.indexrelid AND con.contype IN ('p', 'u', 'x')) \
         ORDER BY i.relname, k.position",
        &[Value::Int64(oid)],
        cancel,
    )
    .await?;

    for rows in group_by_name(&result.rows) {
        let first = rows[0];
        let index_name = first.text_or_empty("name");
        if first.flag("is_partial") {
            tracing::debug!(index = %index_name, "skipping partial index");
            continue;
        }

        let mut columns = Vec::with_capacity(rows.len());
        for key in &rows {
            match key.text("column_name") {
                Some(column_name) if key.flag("descending") => {
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
            tracing::debug!(index = %index_name, "skipping expression index");
            continue;
        }

        let mut index = Index::new(table.table_name.as_str(), columns)
            .named(index_name)
            .in_schema(table.schema_name.as_deref());
        if first.flag("is_unique") {
            index = index.unique();
        }
        table.indexes.push(index);
    }
    Ok(())
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

/// The expression inside `pg_get_constraintdef` output such as
/// `CHECK ((price > (0)::numeric)) NOT VALID`.
pub(super) fn check_expression(definition: &str) -> String {
    let mut body = definition.trim();
    if let Some(rest) = body.strip_suffix("NOT VALID") {
        body = rest.trim_end();
    }
    if let Some(rest) = body.strip_suffix("NO INHERIT") {
        body = rest.trim_end();
    }
    if body.len() >= 5 && body[..5].eq_ignore_ascii_case("CHECK") {
        body = body[5..].trim_start();
    }
    match body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) => inner.trim().to_string(),
        None => body.to_string(),
    }
}
