//! PostgreSQL schema driver
//!
//! Catalog reads go through `pg_catalog` with the target table resolved once
//! via `regclass`. PostgreSQL keeps no names for column defaults, so defaults
//! read back under their deterministic `df_{table}_{column}` name.

mod ddl;
mod introspect;

use crate::types::postgres_type_map;
use async_trait::async_trait;
use schemata_core::model::{Index, Table, View};
use schemata_core::schema::{
    CheckConstraintMethods, ColumnMethods, DefaultConstraintMethods, DialectSchema,
    ForeignKeyConstraintMethods, IndexMethods, PrimaryKeyConstraintMethods, SchemaCapabilities,
    SchemaMethods, TableAlteration, TableMethods, UniqueConstraintMethods, ViewMethods,
};
use schemata_core::typemap::DialectTypeMap;
use schemata_core::{CancellationToken, Dialect, Result, SchemataError, SqlExecutor, cancellation};

pub(crate) const DEFAULT_SCHEMA: &str = "public";

pub struct PostgresSchema {
    type_map: DialectTypeMap,
}

impl PostgresSchema {
    pub fn new() -> Self {
        Self {
            type_map: postgres_type_map(),
        }
    }

    fn schema_or_default<'a>(&self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(DEFAULT_SCHEMA)
    }
}

impl Default for PostgresSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PostgresSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSchema").finish_non_exhaustive()
    }
}

#[async_trait]
impl DialectSchema for PostgresSchema {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    fn capabilities(&self) -> SchemaCapabilities {
        SchemaCapabilities {
            supports_schemas: true,
            supports_ordered_keys_in_constraints: false,
            supports_check_constraints: true,
            ddl_is_transactional: true,
            rebuilds_tables_for_alterations: false,
            unique_constraints_are_indexes: false,
        }
    }

    fn type_map(&self) -> &DialectTypeMap {
        &self.type_map
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some(DEFAULT_SCHEMA)
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    async fn fetch_schema_names(
        &self,
        db: &dyn SqlExecutor,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        introspect::schema_names(db, cancel).await
    }

    async fn fetch_table_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        introspect::table_names(db, self.schema_or_default(schema), cancel).await
    }

    async fn fetch_table(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Table>> {
        introspect::table(self, db, self.schema_or_default(schema), table_name, cancel).await
    }

    async fn fetch_views(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<View>> {
        introspect::views(db, self.schema_or_default(schema), cancel).await
    }

    fn drop_schema_sql(&self, schema: &str) -> Result<Vec<String>> {
        if schema.eq_ignore_ascii_case(DEFAULT_SCHEMA) {
            return Err(SchemataError::Schema(format!(
                "refusing to drop the default schema '{}'",
                DEFAULT_SCHEMA
            )));
        }
        Ok(vec![format!("DROP SCHEMA {}", self.quote_identifier(schema))])
    }

    fn create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        let mut statements = vec![self.create_table_statement(table)?];
        statements.extend(
            table
                .effective_constraints()
                .indexes
                .iter()
                .map(|index| self.index_statement(index, table.schema_name.as_deref(), &table.table_name)),
        );
        Ok(statements)
    }

    fn rename_table_sql(
        &self,
        schema: Option<&str>,
        table_name: &str,
        new_name: &str,
    ) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME TO {}",
            self.qualify(schema, table_name),
            self.quote_identifier(new_name)
        )]
    }

    fn alteration_sql(&self, table: &Table, alteration: &TableAlteration) -> Result<Vec<String>> {
        self.alteration_statements(table, alteration)
    }

    fn create_index_sql(&self, index: &Index) -> Result<Vec<String>> {
        if index.columns.is_empty() {
            return Err(SchemataError::Schema(format!(
                "index '{}' has no columns",
                index.index_name
            )));
        }
        Ok(vec![self.index_statement(
            index,
            index.schema_name.as_deref(),
            &index.table_name,
        )])
    }

    fn drop_index_sql(&self, index: &Index) -> Vec<String> {
        vec![format!(
            "DROP INDEX {}",
            self.qualify(index.schema_name.as_deref(), &index.index_name)
        )]
    }

    fn rename_view_sql(&self, view: &View, new_name: &str) -> Vec<String> {
        vec![format!(
            "ALTER VIEW {} RENAME TO {}",
            self.qualify(view.schema_name.as_deref(), &view.view_name),
            self.quote_identifier(new_name)
        )]
    }

    #[tracing::instrument(skip(self, db, table, alteration, cancel), fields(table = %table.table_name, alteration = alteration.kind()))]
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

impl SchemaMethods for PostgresSchema {}
impl TableMethods for PostgresSchema {}
impl ColumnMethods for PostgresSchema {}
impl IndexMethods for PostgresSchema {}
impl CheckConstraintMethods for PostgresSchema {}
impl DefaultConstraintMethods for PostgresSchema {}
impl UniqueConstraintMethods for PostgresSchema {}
impl ForeignKeyConstraintMethods for PostgresSchema {}
impl PrimaryKeyConstraintMethods for PostgresSchema {}
impl ViewMethods for PostgresSchema {}
