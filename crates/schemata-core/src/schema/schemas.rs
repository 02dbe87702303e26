use super::{DialectSchema, find_name};
use crate::model::naming;
use crate::{Result, SqlExecutor, cancellation};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Schema (namespace) operations. On dialects without schemas every call is a
/// no-op that reports `false` or an empty list.
#[async_trait]
pub trait SchemaMethods: DialectSchema {
    fn supports_schemas(&self) -> bool {
        self.capabilities().supports_schemas
    }

    async fn schema_exists(
        &self,
        db: &dyn SqlExecutor,
        schema_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if !self.supports_schemas() {
            return Ok(false);
        }
        let names = self.fetch_schema_names(db, cancel).await?;
        Ok(find_name(&names, schema_name).is_some())
    }

    async fn get_schema_names(
        &self,
        db: &dyn SqlExecutor,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if !self.supports_schemas() {
            return Ok(Vec::new());
        }
        let names = self.fetch_schema_names(db, cancel).await?;
        Ok(names
            .into_iter()
            .filter(|name| naming::matches_filter(name, filter))
            .collect())
    }

    #[tracing::instrument(skip_all, fields(schema = %schema_name))]
    async fn create_schema_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        schema_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if !self.supports_schemas() {
            tracing::debug!(dialect = %self.dialect(), "schemas not supported, nothing to create");
            return Ok(false);
        }
        if self.schema_exists(db, schema_name, cancel).await? {
            tracing::debug!(schema = %schema_name, "schema already exists");
            return Ok(false);
        }
        let statements = self.create_schema_sql(schema_name)?;
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(dialect = %self.dialect(), schema = %schema_name, "created schema");
        Ok(true)
    }

    /// Drop an empty schema. Dropping one that still holds objects fails with
    /// the server's error.
    #[tracing::instrument(skip_all, fields(schema = %schema_name))]
    async fn drop_schema_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if !self.supports_schemas() {
            return Ok(false);
        }
        let names = self.fetch_schema_names(db, cancel).await?;
        let Some(actual) = find_name(&names, schema_name) else {
            tracing::debug!(schema = %schema_name, "schema does not exist");
            return Ok(false);
        };
        let statements = self.drop_schema_sql(actual)?;
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(dialect = %self.dialect(), schema = %actual, "dropped schema");
        Ok(true)
    }
}
