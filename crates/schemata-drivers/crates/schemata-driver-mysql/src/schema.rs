//! MySQL schema driver
//!
//! MySQL has no schemas inside a database; every catalog read is scoped to
//! `DATABASE()`. Unique constraints and indexes are the same catalog object.
//! A foreign key leaves its supporting index behind when dropped; dropping the
//! key also drops that index unless the server still needs it.

mod ddl;
mod introspect;

use crate::types::mysql_type_map;
use async_trait::async_trait;
use schemata_core::model::{Index, Table, View};
use schemata_core::schema::{
    CheckConstraintMethods, ColumnMethods, DefaultConstraintMethods, DialectSchema,
    ForeignKeyConstraintMethods, IndexMethods, PrimaryKeyConstraintMethods, SchemaCapabilities,
    SchemaMethods, TableAlteration, TableMethods, UniqueConstraintMethods, ViewMethods,
};
use schemata_core::typemap::DialectTypeMap;
use schemata_core::{CancellationToken, Dialect, Result, SchemataError, SqlExecutor, cancellation};

pub struct MySqlSchema {
    type_map: DialectTypeMap,
}

impl MySqlSchema {
    pub fn new() -> Self {
        Self {
            type_map: mysql_type_map(),
        }
    }
}

impl Default for MySqlSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MySqlSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSchema").finish_non_exhaustive()
    }
}

#[async_trait]
impl DialectSchema for MySqlSchema {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn capabilities(&self) -> SchemaCapabilities {
        SchemaCapabilities {
            supports_schemas: false,
            supports_ordered_keys_in_constraints: false,
            supports_check_constraints: true,
            ddl_is_transactional: false,
            rebuilds_tables_for_alterations: false,
            unique_constraints_are_indexes: true,
        }
    }

    fn type_map(&self) -> &DialectTypeMap {
        &self.type_map
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
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

    fn create_schema_sql(&self, schema: &str) -> Result<Vec<String>> {
        Err(SchemataError::Schema(format!(
            "MySQL has no schemas inside a database; cannot create '{}'",
            schema
        )))
    }

    fn drop_schema_sql(&self, schema: &str) -> Result<Vec<String>> {
        Err(SchemataError::Schema(format!(
            "MySQL has no schemas inside a database; cannot drop '{}'",
            schema
        )))
    }

    fn create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        Ok(vec![self.create_table_statement(table)?])
    }

    fn rename_table_sql(
        &self,
        _schema: Option<&str>,
        table_name: &str,
        new_name: &str,
    ) -> Vec<String> {
        vec![format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(table_name),
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
        Ok(vec![format!(
            "CREATE {} ON {} ({})",
            self.index_clause(index),
            self.quote_identifier(&index.table_name),
            self.key_list(&index.columns, !index.is_unique)
        )])
    }

    fn drop_index_sql(&self, index: &Index) -> Vec<String> {
        vec![format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&index.index_name),
            self.quote_identifier(&index.table_name)
        )]
    }

    fn rename_view_sql(&self, view: &View, new_name: &str) -> Vec<String> {
        vec![format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(&view.view_name),
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
        cancellation::execute_all(db, &statements, cancel).await?;

        // the index created for a foreign key outlives the key
        if let TableAlteration::DropForeignKey(fk) = &alteration
            && introspect::index_exists(db, &table.table_name, &fk.constraint_name, cancel).await?
        {
            tracing::debug!(index = %fk.constraint_name, "dropping index left behind by foreign key");
            let index = Index::new(table.table_name.as_str(), fk.columns.iter().map(String::as_str))
                .named(fk.constraint_name.as_str());
            match cancellation::execute_all(db, &self.drop_index_sql(&index), cancel).await {
                Err(e) if !e.is_cancelled() => tracing::warn!(
                    index = %fk.constraint_name,
                    error = %e,
                    "kept index left behind by foreign key"
                ),
                other => other?,
            }
        }
        Ok(())
    }
}

impl SchemaMethods for MySqlSchema {}
impl TableMethods for MySqlSchema {}
impl ColumnMethods for MySqlSchema {}
impl IndexMethods for MySqlSchema {}
impl CheckConstraintMethods for MySqlSchema {}
impl DefaultConstraintMethods for MySqlSchema {}
impl UniqueConstraintMethods for MySqlSchema {}
impl ForeignKeyConstraintMethods for MySqlSchema {}
impl PrimaryKeyConstraintMethods for MySqlSchema {}
impl ViewMethods for MySqlSchema {}
