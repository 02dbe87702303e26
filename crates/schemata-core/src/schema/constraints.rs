//! Constraint operations, one trait per constraint kind
//!
//! Every read goes through whole-table introspection, so a constraint is found
//! wherever the driver's catalog queries put it. Writes become a single
//! [`TableAlteration`] against the current table shape.

use super::{TableAlteration, TableMethods};
use crate::model::{
    CheckConstraint, DefaultConstraint, ForeignKeyConstraint, PrimaryKeyConstraint, Table,
    UniqueConstraint, naming,
};
use crate::{Result, SchemataError, SqlExecutor};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

fn named<'a, T>(items: &'a [T], name: &str, name_of: impl Fn(&T) -> &str) -> Option<&'a T> {
    items
        .iter()
        .find(|item| name_of(item) == name)
        .or_else(|| items.iter().find(|item| name_of(item).eq_ignore_ascii_case(name)))
}

fn single_column(columns: &[&str], column_name: &str) -> bool {
    columns.len() == 1 && columns[0].eq_ignore_ascii_case(column_name)
}

/// Point a constraint built for a table at the names the catalog reports.
fn relocate(table: &Table) -> (Option<String>, String) {
    (table.schema_name.clone(), table.table_name.clone())
}

#[async_trait]
pub trait CheckConstraintMethods: TableMethods {
    async fn check_constraint_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self
            .get_check_constraint(db, schema, table_name, constraint_name, cancel)
            .await?
            .is_some())
    }

    async fn get_check_constraint(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CheckConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(None);
        };
        Ok(named(&table.check_constraints, constraint_name, |c| c.constraint_name.as_str()).cloned())
    }

    async fn get_check_constraints(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CheckConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(Vec::new());
        };
        Ok(table
            .check_constraints
            .into_iter()
            .filter(|c| naming::matches_filter(&c.constraint_name, filter))
            .collect())
    }

    async fn get_check_constraint_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let checks = self
            .get_check_constraints(db, schema, table_name, filter, cancel)
            .await?;
        Ok(checks.into_iter().map(|c| c.constraint_name).collect())
    }

    async fn get_check_constraint_on_column(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CheckConstraint>> {
        let checks = self
            .get_check_constraints(db, schema, table_name, None, cancel)
            .await?;
        Ok(checks.into_iter().find(|c| {
            c.column_name
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(column_name))
        }))
    }

    async fn create_check_constraint_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        check: &CheckConstraint,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if !self.capabilities().supports_check_constraints {
            return Err(SchemataError::NotSupported(format!(
                "{} does not enforce check constraints",
                self.dialect()
            )));
        }
        let table = self
            .require_table(db, check.schema_name.as_deref(), &check.table_name, cancel)
            .await?;
        if named(&table.check_constraints, &check.constraint_name, |c| c.constraint_name.as_str()).is_some()
        {
            tracing::debug!(constraint = %check.constraint_name, "check constraint already exists");
            return Ok(false);
        }
        let (schema_name, table_name) = relocate(&table);
        let check = CheckConstraint {
            schema_name,
            table_name,
            ..check.clone()
        };
        self.alter_table(db, &table, TableAlteration::AddCheck(check), cancel)
            .await?;
        Ok(true)
    }

    async fn drop_check_constraint_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(false);
        };
        let Some(check) =
            named(&table.check_constraints, constraint_name, |c| c.constraint_name.as_str()).cloned()
        else {
            return Ok(false);
        };
        self.alter_table(db, &table, TableAlteration::DropCheck(check), cancel)
            .await?;
        Ok(true)
    }

    async fn drop_check_constraint_on_column_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(check) = self
            .get_check_constraint_on_column(db, schema, table_name, column_name, cancel)
            .await?
        else {
            return Ok(false);
        };
        self.drop_check_constraint_if_exists(db, schema, table_name, &check.constraint_name, cancel)
            .await
    }
}

#[async_trait]
pub trait DefaultConstraintMethods: TableMethods {
    async fn default_constraint_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self
            .get_default_constraint(db, schema, table_name, constraint_name, cancel)
            .await?
            .is_some())
    }

    async fn get_default_constraint(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<DefaultConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(None);
        };
        Ok(named(&table.default_constraints, constraint_name, |d| d.constraint_name.as_str()).cloned())
    }

    async fn get_default_constraints(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DefaultConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(Vec::new());
        };
        Ok(table
            .default_constraints
            .into_iter()
            .filter(|d| naming::matches_filter(&d.constraint_name, filter))
            .collect())
    }

    async fn get_default_constraint_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let defaults = self
            .get_default_constraints(db, schema, table_name, filter, cancel)
            .await?;
        Ok(defaults.into_iter().map(|d| d.constraint_name).collect())
    }

    async fn get_default_constraint_on_column(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<DefaultConstraint>> {
        let defaults = self
            .get_default_constraints(db, schema, table_name, None, cancel)
            .await?;
        Ok(defaults
            .into_iter()
            .find(|d| d.column_name.eq_ignore_ascii_case(column_name)))
    }

    /// A column holds at most one default, so this is a no-op when the column
    /// already has one under any name.
    async fn create_default_constraint_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        default: &DefaultConstraint,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let table = self
            .require_table(db, default.schema_name.as_deref(), &default.table_name, cancel)
            .await?;
        let Some(column) = table.column(&default.column_name) else {
            return Err(SchemataError::NotFound(format!(
                "column '{}' on table '{}'",
                default.column_name, table.table_name
            )));
        };
        let taken = table
            .default_constraints
            .iter()
            .any(|d| d.column_name.eq_ignore_ascii_case(&default.column_name))
            || named(&table.default_constraints, &default.constraint_name, |d| {
                d.constraint_name.as_str()
            })
            .is_some();
        if taken {
            tracing::debug!(column = %default.column_name, "column already has a default");
            return Ok(false);
        }
        let (schema_name, table_name) = relocate(&table);
        let default = DefaultConstraint {
            schema_name,
            table_name,
            column_name: column.column_name.clone(),
            ..default.clone()
        };
        self.alter_table(db, &table, TableAlteration::AddDefault(default), cancel)
            .await?;
        Ok(true)
    }

    async fn drop_default_constraint_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(false);
        };
        let Some(default) =
            named(&table.default_constraints, constraint_name, |d| d.constraint_name.as_str()).cloned()
        else {
            return Ok(false);
        };
        self.alter_table(db, &table, TableAlteration::DropDefault(default), cancel)
            .await?;
        Ok(true)
    }

    async fn drop_default_constraint_on_column_if_exists(
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
        let Some(default) = table
            .default_constraints
            .iter()
            .find(|d| d.column_name.eq_ignore_ascii_case(column_name))
            .cloned()
        else {
            return Ok(false);
        };
        self.alter_table(db, &table, TableAlteration::DropDefault(default), cancel)
            .await?;
        Ok(true)
    }
}

#[async_trait]
pub trait UniqueConstraintMethods: TableMethods {
    async fn unique_constraint_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self
            .get_unique_constraint(db, schema, table_name, constraint_name, cancel)
            .await?
            .is_some())
    }

    async fn get_unique_constraint(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UniqueConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(None);
        };
        Ok(named(&table.unique_constraints, constraint_name, |u| u.constraint_name.as_str()).cloned())
    }

    async fn get_unique_constraints(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<UniqueConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(Vec::new());
        };
        Ok(table
            .unique_constraints
            .into_iter()
            .filter(|u| naming::matches_filter(&u.constraint_name, filter))
            .collect())
    }

    async fn get_unique_constraint_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let uniques = self
            .get_unique_constraints(db, schema, table_name, filter, cancel)
            .await?;
        Ok(uniques.into_iter().map(|u| u.constraint_name).collect())
    }

    /// The single-column unique constraint on `column_name`, if any.
    async fn get_unique_constraint_on_column(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UniqueConstraint>> {
        let uniques = self
            .get_unique_constraints(db, schema, table_name, None, cancel)
            .await?;
        Ok(uniques
            .into_iter()
            .find(|u| single_column(&u.column_names(), column_name)))
    }

    async fn create_unique_constraint_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        unique: &UniqueConstraint,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let table = self
            .require_table(db, unique.schema_name.as_deref(), &unique.table_name, cancel)
            .await?;
        if named(&table.unique_constraints, &unique.constraint_name, |u| u.constraint_name.as_str())
            .is_some()
        {
            tracing::debug!(constraint = %unique.constraint_name, "unique constraint already exists");
            return Ok(false);
        }
        let (schema_name, table_name) = relocate(&table);
        let unique = UniqueConstraint {
            schema_name,
            table_name,
            ..unique.clone()
        };
        self.alter_table(db, &table, TableAlteration::AddUnique(unique), cancel)
            .await?;
        Ok(true)
    }

    async fn drop_unique_constraint_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(false);
        };
        let Some(unique) =
            named(&table.unique_constraints, constraint_name, |u| u.constraint_name.as_str()).cloned()
        else {
            return Ok(false);
        };
        self.alter_table(db, &table, TableAlteration::DropUnique(unique), cancel)
            .await?;
        Ok(true)
    }
}

#[async_trait]
pub trait ForeignKeyConstraintMethods: TableMethods {
    async fn foreign_key_constraint_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self
            .get_foreign_key_constraint(db, schema, table_name, constraint_name, cancel)
            .await?
            .is_some())
    }

    async fn get_foreign_key_constraint(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ForeignKeyConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(None);
        };
        Ok(named(&table.foreign_key_constraints, constraint_name, |f| {
            f.constraint_name.as_str()
        })
        .cloned())
    }

    async fn get_foreign_key_constraints(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ForeignKeyConstraint>> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(Vec::new());
        };
        Ok(table
            .foreign_key_constraints
            .into_iter()
            .filter(|f| naming::matches_filter(&f.constraint_name, filter))
            .collect())
    }

    async fn get_foreign_key_constraint_names(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let foreign_keys = self
            .get_foreign_key_constraints(db, schema, table_name, filter, cancel)
            .await?;
        Ok(foreign_keys.into_iter().map(|f| f.constraint_name).collect())
    }

    /// The single-column foreign key on `column_name`, if any.
    async fn get_foreign_key_constraint_on_column(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        column_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ForeignKeyConstraint>> {
        let foreign_keys = self
            .get_foreign_key_constraints(db, schema, table_name, None, cancel)
            .await?;
        Ok(foreign_keys.into_iter().find(|f| {
            let columns: Vec<&str> = f.columns.iter().map(String::as_str).collect();
            single_column(&columns, column_name)
        }))
    }

    async fn create_foreign_key_constraint_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        foreign_key: &ForeignKeyConstraint,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if foreign_key.columns.len() != foreign_key.referenced_columns.len() {
            return Err(SchemataError::Schema(format!(
                "foreign key '{}' has {} columns but references {}",
                foreign_key.constraint_name,
                foreign_key.columns.len(),
                foreign_key.referenced_columns.len()
            )));
        }
        let table = self
            .require_table(
                db,
                foreign_key.schema_name.as_deref(),
                &foreign_key.table_name,
                cancel,
            )
            .await?;
        if named(
            &table.foreign_key_constraints,
            &foreign_key.constraint_name,
            |f| f.constraint_name.as_str(),
        )
        .is_some()
        {
            tracing::debug!(constraint = %foreign_key.constraint_name, "foreign key already exists");
            return Ok(false);
        }
        let (schema_name, table_name) = relocate(&table);
        let foreign_key = ForeignKeyConstraint {
            schema_name,
            table_name,
            ..foreign_key.clone()
        };
        self.alter_table(db, &table, TableAlteration::AddForeignKey(foreign_key), cancel)
            .await?;
        Ok(true)
    }

    async fn drop_foreign_key_constraint_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        constraint_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(false);
        };
        let Some(foreign_key) = named(&table.foreign_key_constraints, constraint_name, |f| {
            f.constraint_name.as_str()
        })
        .cloned() else {
            return Ok(false);
        };
        self.alter_table(db, &table, TableAlteration::DropForeignKey(foreign_key), cancel)
            .await?;
        Ok(true)
    }
}

/// A table has at most one primary key, so these take no constraint name.
#[async_trait]
pub trait PrimaryKeyConstraintMethods: TableMethods {
    async fn primary_key_constraint_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self
            .get_primary_key_constraint(db, schema, table_name, cancel)
            .await?
            .is_some())
    }

    async fn get_primary_key_constraint(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PrimaryKeyConstraint>> {
        let table = self.get_table(db, schema, table_name, cancel).await?;
        Ok(table.and_then(|t| t.primary_key))
    }

    async fn create_primary_key_constraint_if_not_exists(
        &self,
        db: &dyn SqlExecutor,
        primary_key: &PrimaryKeyConstraint,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let table = self
            .require_table(
                db,
                primary_key.schema_name.as_deref(),
                &primary_key.table_name,
                cancel,
            )
            .await?;
        if table.primary_key.is_some() {
            tracing::debug!(table = %table.table_name, "table already has a primary key");
            return Ok(false);
        }
        let (schema_name, table_name) = relocate(&table);
        let primary_key = PrimaryKeyConstraint {
            schema_name,
            table_name,
            ..primary_key.clone()
        };
        self.alter_table(db, &table, TableAlteration::AddPrimaryKey(primary_key), cancel)
            .await?;
        Ok(true)
    }

    async fn drop_primary_key_constraint_if_exists(
        &self,
        db: &dyn SqlExecutor,
        schema: Option<&str>,
        table_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(table) = self.get_table(db, schema, table_name, cancel).await? else {
            return Ok(false);
        };
        let Some(primary_key) = table.primary_key.clone() else {
            return Ok(false);
        };
        self.alter_table(db, &table, TableAlteration::DropPrimaryKey(primary_key), cancel)
            .await?;
        Ok(true)
    }
}
