use super::{SchemaCapabilities, TableMethods};
use crate::model::{Index, Table, naming};
use crate::{Result, SqlExecutor, cancellation};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Standalone indexes. Indexes a server creates to back a primary key or
/// unique constraint are not listed here.
#[async_trait]
pub trait IndexMethods: TableMethods {
    async fn index_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        index_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self
            .get_index(db, schema, table_name, index_name, cancel)
            .await?
            .is_some())
    }

    async fn get_index(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        index_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Index>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(None);
        };
        Ok(find_index(&table, index_name, &self.capabilities()))
    }

    async fn get_indexes(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Index>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(Vec::new());
        };
        Ok(table
            .indexes
            .into_iter()
            .filter(|i| naming::matches_filter(&i.index_name, filter))
            .collect())
    }

    async fn get_index_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let indexes = self
            .get_indexes(db, schema, table_name, filter, cancel)
            .await?;
        Ok(indexes.into_iter().map(|i| i.index_name).collect())
    }

    /// Every index that includes `column_name` at any position.
    async fn get_indexes_on_column(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Index>> {
        let indexes = self
            .get_indexes(db, schema, table_name, None, cancel)
            .await?;
        Ok(indexes.into_iter().filter(|i| i.covers(column_name)).collect())
    }

    #[tracing::instrument(skip_all, fields(table = %index.table_name, index = %index.index_name))]
    async fn create_index_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        index: &Index,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let table = self
            .require_table(db, index.schema_name.as_deref(), &index.table_name, cancel)
            .await?;
        if find_index(&table, &index.index_name, &self.capabilities()).is_some() {
            tracing::debug!(index = %index.index_name, "index already exists");
            return Ok(false);
        }

        let index = Index {
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
            ..index.clone()
        };
        let statements = self.create_index_sql(&index)?;
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(
            dialect = %self.dialect(),
            table = %index.table_name,
            index = %index.index_name,
            unique = index.is_unique,
            "created index"
        );
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(table = %table_name, index = %index_name))]
    async fn drop_index_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        index_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(index) = self
            .get_index(db, schema, table_name, index_name, cancel)
            .await?
        else {
            tracing::debug!(index = %index_name, "index does not exist");
            return Ok(false);
        };
        let statements = self.drop_index_sql(&index);
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(dialect = %self.dialect(), index = %index.index_name, "dropped index");
        Ok(true)
    }
}

/// Look `index_name` up among the table's indexes, then among its unique
/// constraints where the dialect keeps both in one namespace.
fn find_index(table: &Table, index_name: &str, capabilities: &SchemaCapabilities) -> Option<Index> {
    if let Some(index) = table
        .indexes
        .iter()
        .find(|i| i.index_name.eq_ignore_ascii_case(index_name))
    {
        return Some(index.clone());
    }
    if !capabilities.unique_constraints_are_indexes {
        return None;
    }
    table
        .unique_constraints
        .iter()
        .find(|u| u.constraint_name.eq_ignore_ascii_case(index_name))
        .map(|unique| Index {
            schema_name: unique.schema_name.clone(),
            table_name: unique.table_name.clone(),
            index_name: unique.constraint_name.clone(),
            columns: unique.columns.clone(),
            is_unique: true,
        })
}
