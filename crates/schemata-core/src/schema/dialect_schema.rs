//! Dialect hooks the schema operations are built from
//!
//! A driver implements [`DialectSchema`]: catalog reads that return model
//! entities, and SQL builders for each DDL action. The per-kind operation traits
//! supply existence checks, idempotence and logging on top of it.

use super::{SchemaCapabilities, TableAlteration};
use crate::model::{Column, Index, OrderedColumn, SortOrder, Table, View};
use crate::typemap::DialectTypeMap;
use crate::{Dialect, Result, SchemataError, SqlExecutor, cancellation};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait DialectSchema: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn capabilities(&self) -> SchemaCapabilities;

    /// Built once per driver instance.
    fn type_map(&self) -> &DialectTypeMap;

    /// Schema used when a call passes none (`dbo`, `public`).
    fn default_schema(&self) -> Option<&'static str> {
        None
    }

    fn quote_identifier(&self, name: &str) -> String;

    /// The schema a call actually targets: `None` on dialects without schemas,
    /// otherwise the argument or the default schema.
    fn effective_schema<'a>(&self, schema: Option<&'a str>) -> Option<&'a str> {
        if !self.capabilities().supports_schemas {
            return None;
        }
        schema
            .filter(|s| !s.trim().is_empty())
            .or(self.default_schema())
    }

    /// Quoted, schema-qualified object name.
    fn qualify(&self, schema: Option<&str>, name: &str) -> String {
        match self.effective_schema(schema) {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(name),
        }
    }

    fn quote_list(&self, names: &[&str]) -> String {
        names
            .iter()
            .map(|name| self.quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Key column list. Order keywords are emitted only when `with_order` is set
    /// and a column is descending.
    fn key_list(&self, columns: &[OrderedColumn], with_order: bool) -> String {
        columns
            .iter()
            .map(|c| match (with_order, c.order) {
                (true, SortOrder::Descending) => {
                    format!("{} DESC", self.quote_identifier(&c.column_name))
                }
                _ => self.quote_identifier(&c.column_name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn resolve_column_type(&self, column: &Column) -> Result<String> {
        self.type_map().resolve_column(column)
    }

    // ---- catalog reads ----------------------------------------------------

    async fn fetch_schema_names(
        &self,
        db: &dyn SqlExecutor,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>>;

    async fn fetch_table_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>>;

    /// The table with its columns, constraints and indexes, or `None`.
    async fn fetch_table(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Table>>;

    async fn fetch_views(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<View>>;

    // ---- DDL builders -----------------------------------------------------

    fn create_schema_sql(&self, schema: &str) -> Result<Vec<String>> {
        Ok(vec![format!(
            "CREATE SCHEMA {}",
            self.quote_identifier(schema)
        )])
    }

    fn drop_schema_sql(&self, schema: &str) -> Result<Vec<String>> {
        Ok(vec![format!("DROP SCHEMA {}", self.quote_identifier(schema))])
    }

    /// `CREATE TABLE` followed by any statements that cannot be inlined
    /// (indexes, mostly).
    fn create_table_sql(&self, table: &Table) -> Result<Vec<String>>;

    fn drop_table_sql(&self, schema: Option<&str>, table_name: &str) -> Vec<String> {
        vec![format!("DROP TABLE {}", self.qualify(schema, table_name))]
    }

    fn rename_table_sql(
        &self,
        schema: Option<&str>,
        table_name: &str,
        new_name: &str,
    ) -> Vec<String>;

    fn truncate_table_sql(&self, schema: Option<&str>, table_name: &str) -> Vec<String> {
        vec![format!("TRUNCATE TABLE {}", self.qualify(schema, table_name))]
    }

    /// Statements for one alteration of `table`, which is the current
    /// introspected shape.
    fn alteration_sql(&self, table: &Table, alteration: &TableAlteration) -> Result<Vec<String>>;

    fn create_index_sql(&self, index: &Index) -> Result<Vec<String>>;

    fn drop_index_sql(&self, index: &Index) -> Vec<String>;

    fn create_view_sql(&self, view: &View) -> Vec<String> {
        vec![format!(
            "CREATE VIEW {} AS {}",
            self.qualify(view.schema_name.as_deref(), &view.view_name),
            view.definition.trim().trim_end_matches(';')
        )]
    }

    fn drop_view_sql(&self, schema: Option<&str>, view_name: &str) -> Vec<String> {
        vec![format!("DROP VIEW {}", self.qualify(schema, view_name))]
    }

    fn rename_view_sql(&self, view: &View, new_name: &str) -> Vec<String>;

    // ---- execution --------------------------------------------------------

    /// Apply one alteration to an existing table.
    #[tracing::instrument(skip_all, fields(table = %table.table_name, alteration = alteration.kind()))]
    async fn alter_table(
        &self,
        db: &dyn SqlExecutor,
        table: &Table,
        alteration: TableAlteration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let statements = self.alteration_sql(table, &alteration)?;
        cancellation::execute_all(db, &statements, cancel).await
    }
}

/// Bring an introspected table in line with what the dialect can represent.
pub fn finish_introspected_table(mut table: Table, capabilities: &SchemaCapabilities) -> Table {
    if !capabilities.supports_schemas {
        table.schema_name = None;
        for column in &mut table.columns {
            column.schema_name = None;
        }
        if let Some(pk) = &mut table.primary_key {
            pk.schema_name = None;
        }
        table.check_constraints.iter_mut().for_each(|c| c.schema_name = None);
        table.default_constraints.iter_mut().for_each(|d| d.schema_name = None);
        table.unique_constraints.iter_mut().for_each(|u| u.schema_name = None);
        table.indexes.iter_mut().for_each(|i| i.schema_name = None);
        for fk in &mut table.foreign_key_constraints {
            fk.schema_name = None;
            fk.referenced_schema_name = None;
        }
    }

    if !capabilities.supports_ordered_keys_in_constraints {
        let ascending = |columns: &mut Vec<OrderedColumn>| {
            columns.iter_mut().for_each(|c| c.order = SortOrder::Ascending)
        };
        if let Some(pk) = &mut table.primary_key {
            ascending(&mut pk.columns);
        }
        table
            .unique_constraints
            .iter_mut()
            .for_each(|u| ascending(&mut u.columns));
        table
            .indexes
            .iter_mut()
            .filter(|i| i.is_unique)
            .for_each(|i| ascending(&mut i.columns));
    }

    table.sync_column_flags();
    table
}

/// Pick `wanted` out of catalog names: exact match first, then ignoring case.
pub fn find_name<'a>(names: &'a [String], wanted: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|n| n.as_str() == wanted)
        .or_else(|| names.iter().find(|n| n.eq_ignore_ascii_case(wanted)))
        .map(String::as_str)
}

pub(crate) fn table_not_found(schema: Option<&str>, table_name: &str) -> SchemataError {
    match schema {
        Some(schema) => SchemataError::NotFound(format!("table '{}.{}'", schema, table_name)),
        None => SchemataError::NotFound(format!("table '{}'", table_name)),
    }
}
