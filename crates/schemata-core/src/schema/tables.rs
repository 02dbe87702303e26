use super::{DialectSchema, finish_introspected_table, find_name, table_not_found};
use crate::model::{Table, naming};
use crate::{Result, SqlExecutor, cancellation};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait TableMethods: DialectSchema {
    async fn table_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let names = self
            .fetch_table_names(db, self.effective_schema(schema), cancel)
            .await?;
        Ok(find_name(&names, table_name).is_some())
    }

    async fn get_table(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Table>> {
        let table = self
            .fetch_table(db, self.effective_schema(schema), table_name, cancel)
            .await?;
        Ok(table.map(|table| finish_introspected_table(table, &self.capabilities())))
    }

    /// Like [`get_table`](Self::get_table), but a missing table is `NotFound`.
    async fn require_table(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Table> {
        self.get_table(db, schema, table_name, cancel)
            .await?
            .ok_or_else(|| table_not_found(self.effective_schema(schema), table_name))
    }

    async fn get_tables(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Table>> {
        let names = self.get_table_names(db, schema, filter, cancel).await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            if let Some(table) = self.get_table(db, schema, &name, cancel).await? {
                tables.push(table);
            }
        }
        Ok(tables)
    }

    async fn get_table_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let names = self
            .fetch_table_names(db, self.effective_schema(schema), cancel)
            .await?;
        Ok(names
            .into_iter()
            .filter(|name| naming::matches_filter(name, filter))
            .collect())
    }

    /// Create the table with its constraints and indexes.
    ///
    /// The table and its inline constraints go out as one statement; indexes
    /// follow as separate statements.
    #[tracing::instrument(skip_all, fields(table = %table.table_name))]
    async fn create_table_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        table: &Table,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        table.validate()?;
        let schema = table.schema_name.as_deref();
        if self
            .table_exists(db, schema, &table.table_name, cancel)
            .await?
        {
            tracing::debug!(table = %table.table_name, "table already exists");
            return Ok(false);
        }

        let statements = self.create_table_sql(table)?;
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(
            dialect = %self.dialect(),
            table = %table.table_name,
            columns = table.columns.len(),
            "created table"
        );
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(table = %table_name))]
    async fn drop_table_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let schema = self.effective_schema(schema);
        let names = self.fetch_table_names(db, schema, cancel).await?;
        let Some(actual) = find_name(&names, table_name) else {
            tracing::debug!(table = %table_name, "table does not exist");
            return Ok(false);
        };
        let statements = self.drop_table_sql(schema, actual);
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(dialect = %self.dialect(), table = %actual, "dropped table");
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(table = %table_name, new_name = %new_table_name))]
    async fn rename_table_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        new_table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let schema = self.effective_schema(schema);
        let names = self.fetch_table_names(db, schema, cancel).await?;
        let Some(actual) = find_name(&names, table_name) else {
            tracing::debug!(table = %table_name, "table does not exist");
            return Ok(false);
        };
        let statements = self.rename_table_sql(schema, actual, new_table_name);
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(
            dialect = %self.dialect(),
            table = %actual,
            new_name = %new_table_name,
            "renamed table"
        );
        Ok(true)
    }

    /// Remove every row, keeping the table.
    async fn truncate_table_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let schema = self.effective_schema(schema);
        let names = self.fetch_table_names(db, schema, cancel).await?;
        let Some(actual) = find_name(&names, table_name) else {
            return Ok(false);
        };
        let statements = self.truncate_table_sql(schema, actual);
        cancellation::execute_all(db, &statements, cancel).await?;
        Ok(true)
    }
}
