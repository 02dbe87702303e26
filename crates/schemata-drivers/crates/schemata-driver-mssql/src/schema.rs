//! SQL Server schema driver
//!
//! Catalog reads go through the `sys` views with the table resolved once to its
//! `object_id`. Defaults are named constraints here, so they read back under
//! whatever name the catalog holds. Renames go through `sp_rename`.

mod ddl;
mod introspect;

use crate::types::mssql_type_map;
use async_trait::async_trait;
use schemata_core::model::{Index, Table, View};
use schemata_core::schema::{
    CheckConstraintMethods, ColumnMethods, DefaultConstraintMethods, DialectSchema,
    ForeignKeyConstraintMethods, IndexMethods, PrimaryKeyConstraintMethods, SchemaCapabilities,
    SchemaMethods, TableAlteration, TableMethods, UniqueConstraintMethods, ViewMethods,
};
use schemata_core::typemap::DialectTypeMap;
use schemata_core::{CancellationToken, Dialect, Result, SchemataError, SqlExecutor, cancellation};

pub(crate) const DEFAULT_SCHEMA: &str = "dbo";

pub struct MssqlSchema {
    type_map: DialectTypeMap,
}

impl MssqlSchema {
    pub fn new() -> Self {
        Self {
            type_map: mssql_type_map(),
        }
    }

    fn schema_or_default<'a>(&self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(DEFAULT_SCHEMA)
    }

    /// `EXEC sp_rename` with the object given as a quoted, qualified name
    /// inside an N'' literal.
    pub(crate) fn sp_rename(&self, object: &str, new_name: &str, kind: Option<&str>) -> String {
        let mut statement = format!(
            "EXEC sp_rename {}, {}",
            unicode_literal(object),
            unicode_literal(new_name)
        );
        if let Some(kind) = kind {
            statement.push_str(&format!(", {}", unicode_literal(kind)));
        }
        statement
    }
}

fn unicode_literal(text: &str) -> String {
    format!("N'{}'", text.replace('\'', "''"))
}

impl Default for MssqlSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MssqlSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlSchema").finish_non_exhaustive()
    }
}

#[async_trait]
impl DialectSchema for MssqlSchema {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn capabilities(&self) -> SchemaCapabilities {
        SchemaCapabilities {
            supports_schemas: true,
            supports_ordered_keys_in_constraints: true,
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
        format!("[{}]", name.replace(']', "]]"))
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
        vec![self.sp_rename(&self.qualify(schema, table_name), new_name, None)]
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
            "DROP INDEX {} ON {}",
            self.quote_identifier(&index.index_name),
            self.qualify(index.schema_name.as_deref(), &index.table_name)
        )]
    }

    /// The stored module text keeps the old name after `sp_rename`;
    /// `OBJECT_DEFINITION` will still show it.
    fn rename_view_sql(&self, view: &View, new_name: &str) -> Vec<String> {
        vec![self.sp_rename(
            &self.qualify(view.schema_name.as_deref(), &view.view_name),
            new_name,
            None,
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

impl SchemaMethods for MssqlSchema {}
impl TableMethods for MssqlSchema {}
impl ColumnMethods for MssqlSchema {}
impl IndexMethods for MssqlSchema {}
impl CheckConstraintMethods for MssqlSchema {}
impl DefaultConstraintMethods for MssqlSchema {}
impl UniqueConstraintMethods for MssqlSchema {}
impl ForeignKeyConstraintMethods for MssqlSchema {}
impl PrimaryKeyConstraintMethods for MssqlSchema {}
impl ViewMethods for MssqlSchema {}
