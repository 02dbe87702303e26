use super::{TableAlteration, TableMethods};
use crate::model::{Column, naming};
use crate::{Result, SqlExecutor};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ColumnMethods: TableMethods {
    async fn column_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self
            .get_column(db, schema, table_name, column_name, cancel)
            .await?
            .is_some())
    }

    async fn get_column(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Column>> {
        let table = self.get_table(db, schema, table_name, cancel).await?;
        Ok(table.and_then(|t| t.column(column_name).cloned()))
    }

    /// Columns in ordinal order; a missing table yields an empty list.
    async fn get_columns(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Column>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(Vec::new());
        };
        Ok(table
            .columns
            .into_iter()
            .filter(|c| naming::matches_filter(&c.column_name, filter))
            .collect())
    }

    async fn get_column_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let columns = self
            .get_columns(db, schema, table_name, filter, cancel)
            .await?;
        Ok(columns.into_iter().map(|c| c.column_name).collect())
    }

    /// Add `column` to its table, which must exist. Column-level constraints
    /// on `column` are created with it.
    #[tracing::instrument(skip_all, fields(table = %column.table_name, column = %column.column_name))]
    async fn create_column_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        column: &Column,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        column.validate()?;
        let table = self
            .require_table(db, column.schema_name.as_deref(), &column.table_name, cancel)
            .await?;
        if table.column(&column.column_name).is_some() {
            tracing::debug!(
                table = %column.table_name,
                column = %column.column_name,
                "column already exists"
            );
            return Ok(false);
        }

        let column = column
            .clone()
            .in_table(table.schema_name.as_deref(), &table.table_name);
        let name = column.column_name.clone();
        self.alter_table(db, &table, TableAlteration::AddColumn(column), cancel)
            .await?;
        tracing::info!(
            dialect = %self.dialect(),
            table = %table.table_name,
            column = %name,
            "added column"
        );
        Ok(true)
    }

    /// Drop a column along with the defaults, checks and single-column
    /// constraints and indexes that depend on it.
    #[tracing::instrument(skip_all, fields(table = %table_name, column = %column_name))]
    async fn drop_column_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(false);
        };
        let Some(actual) = table.column(column_name).map(|c| c.column_name.clone()) else {
            tracing::debug!(table = %table_name, column = %column_name, "column does not exist");
            return Ok(false);
        };
        self.alter_table(db, &table, TableAlteration::DropColumn(actual.clone()), cancel)
            .await?;
        tracing::info!(
            dialect = %self.dialect(),
            table = %table.table_name,
            column = %actual,
            "dropped column"
        );
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(table = %table_name, column = %column_name))]
    async fn rename_column_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        new_column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(false);
        };
        let Some(actual) = table.column(column_name).map(|c| c.column_name.clone()) else {
            return Ok(false);
        };
        let alteration = TableAlteration::RenameColumn {
            from: actual,
            to: new_column_name.to_string(),
        };
        self.alter_table(db, &table, alteration, cancel).await?;
        Ok(true)
    }
}
