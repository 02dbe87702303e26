use super::{DialectSchema, find_name};
use crate::model::{View, naming};
use crate::{Result, SqlExecutor, cancellation};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ViewMethods: DialectSchema {
    async fn view_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        view_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self.get_view(db, schema, view_name, cancel).await?.is_some())
    }

    async fn get_view(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        view_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<View>> {
        let views = self
            .fetch_views(db, self.effective_schema(schema), cancel)
            .await?;
        let names: Vec<String> = views.iter().map(|v| v.view_name.clone()).collect();
        let Some(actual) = find_name(&names, view_name) else {
            return Ok(None);
        };
        Ok(views.into_iter().find(|v| v.view_name == actual))
    }

    async fn get_views(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<View>> {
        let views = self
            .fetch_views(db, self.effective_schema(schema), cancel)
            .await?;
        Ok(views
            .into_iter()
            .filter(|v| naming::matches_filter(&v.view_name, filter))
            .collect())
    }

    async fn get_view_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let views = self.get_views(db, schema, filter, cancel).await?;
        Ok(views.into_iter().map(|v| v.view_name).collect())
    }

    #[tracing::instrument(skip_all, fields(view = %view.view_name))]
    async fn create_view_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        view: &View,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let schema = view.schema_name.as_deref();
        if self.view_exists(db, schema, &view.view_name, cancel).await? {
            tracing::debug!(view = %view.view_name, "view already exists");
            return Ok(false);
        }
        let statements = self.create_view_sql(view);
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(dialect = %self.dialect(), view = %view.view_name, "created view");
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(view = %view_name))]
    async fn drop_view_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        view_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(view) = self.get_view(db, schema, view_name, cancel).await? else {
            return Ok(false);
        };
        let statements = self.drop_view_sql(self.effective_schema(schema), &view.view_name);
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(dialect = %self.dialect(), view = %view.view_name, "dropped view");
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(view = %view_name))]
    async fn rename_view_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        view_name: &str,
        new_view_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(view) = self.get_view(db, schema, view_name, cancel).await? else {
            return Ok(false);
        };
        let statements = self.rename_view_sql(&view, new_view_name);
        cancellation::execute_all(db, &statements, cancel).await?;
        tracing::info!(
            dialect = %self.dialect(),
            view = %view.view_name,
            new_name = %new_view_name,
            "renamed view"
        );
        Ok(true)
    }
}
