//! SQLite schema driver
//!
//! SQLite has no schemas, keeps constraint names only in the stored
//! `CREATE TABLE` text and can alter little in place. Introspection combines the
//! PRAGMA table-valued functions with a read of that text; most alterations
//! rebuild the table.

mod ddl;
mod declaration;
mod introspect;
mod rebuild;

pub use declaration::{DeclaredConstraint, DeclaredKind, TableDeclaration, view_body};

use crate::types::sqlite_type_map;
use async_trait::async_trait;
use schemata_core::model::{Index, Table, View};
use schemata_core::schema::{
    CheckConstraintMethods, ColumnMethods, DefaultConstraintMethods, DialectSchema,
    ForeignKeyConstraintMethods, IndexMethods, PrimaryKeyConstraintMethods, SchemaCapabilities,
    SchemaMethods, TableAlteration, TableMethods, UniqueConstraintMethods, ViewMethods,
};
use schemata_core::typemap::DialectTypeMap;
use schemata_core::{CancellationToken, Dialect, Result, SchemataError, SqlExecutor, cancellation};

pub struct SqliteSchema {
    type_map: DialectTypeMap,
}

impl SqliteSchema {
    pub fn new() -> Self {
        Self {
            type_map: sqlite_type_map(),
        }
    }
}

impl Default for SqliteSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SqliteSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSchema").finish_non_exhaustive()
    }
}

#[async_trait]
impl DialectSchema for SqliteSchema {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn capabilities(&self) -> SchemaCapabilities {
        SchemaCapabilities {
            supports_schemas: false,
            supports_ordered_keys_in_constraints: true,
            supports_check_constraints: true,
            ddl_is_transactional: true,
            rebuilds_tables_for_alterations: true,
            unique_constraints_are_indexes: false,
        }
    }

    fn type_map(&self) -> &DialectTypeMap {
        &self.type_map
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    async fn fetch_schema_names(
        &self,
        _db: &dyn SqlExecutor,
        _cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn fetch_table_names(
        &self,
        db: &dyn SqlExecutor,
        _schema: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        introspect::table_names(db, cancel).await
    }

    async fn fetch_table(
        &self,
        db: &dyn SqlExecutor,
        _schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Table>> {
        introspect::table(self, db, table_name, cancel).await
    }

    async fn fetch_views(
        &self,
        db: &dyn SqlExecutor,
        _schema: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<View>> {
        introspect::views(db, cancel).await
    }

    fn create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        let mut statements = vec![self.create_table_statement(table)?];
        statements.extend(
            table
                .effective_constraints()
                .indexes
                .iter()
                .map(|index| self.index_statement(index, &table.table_name)),
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

    fn truncate_table_sql(&self, schema: Option<&str>, table_name: &str) -> Vec<String> {
        vec![format!("DELETE FROM {}", self.qualify(schema, table_name))]
    }

    fn alteration_sql(&self, table: &Table, alteration: &TableAlteration) -> Result<Vec<String>> {
        match alteration {
            TableAlteration::AddColumn(column) if ddl::adds_in_place(column) => {
                self.add_column_statements(table, column)
            }
            TableAlteration::RenameColumn { from, to } => Ok(vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.qualify(None, &table.table_name),
                self.quote_identifier(from),
                self.quote_identifier(to)
            )]),
            _ => self.rebuild_statements(table, alteration),
        }
    }

    fn create_index_sql(&self, index: &Index) -> Result<Vec<String>> {
        if index.columns.is_empty() {
            return Err(SchemataError::Schema(format!(
                "index '{}' has no columns",
                index.index_name
            )));
        }
        Ok(vec![self.index_statement(index, &index.table_name)])
    }

    fn drop_index_sql(&self, index: &Index) -> Vec<String> {
        vec![format!("DROP INDEX {}", self.quote_identifier(&index.index_name))]
    }

    fn rename_view_sql(&self, view: &View, new_name: &str) -> Vec<String> {
        let renamed = View {
            view_name: new_name.to_string(),
            ..view.clone()
        };
        let mut statements = self.drop_view_sql(None, &view.view_name);
        statements.extend(self.create_view_sql(&renamed));
        statements
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
        if !ddl::rebuilds(&alteration) {
            return cancellation::execute_all(db, &statements, cancel).await;
        }
        rebuild::run(db, &table.table_name, &statements, cancel).await
    }
}

impl SchemaMethods for SqliteSchema {}
impl TableMethods for SqliteSchema {}
impl ColumnMethods for SqliteSchema {}
impl IndexMethods for SqliteSchema {}
impl CheckConstraintMethods for SqliteSchema {}
impl DefaultConstraintMethods for SqliteSchema {}
impl UniqueConstraintMethods for SqliteSchema {}
impl ForeignKeyConstraintMethods for SqliteSchema {}
impl PrimaryKeyConstraintMethods for SqliteSchema {}
impl ViewMethods for SqliteSchema {}
