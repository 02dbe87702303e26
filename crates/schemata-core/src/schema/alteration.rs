//! Single-step table alterations
//!
//! Each mutating column or constraint operation boils down to one
//! [`TableAlteration`]. Dialects with ALTER support turn it into statements;
//! SQLite applies it to the model with [`TableAlteration::apply_to`] and rebuilds
//! the table from the result.

use crate::model::{
    CheckConstraint, Column, DefaultConstraint, ForeignKeyConstraint, PrimaryKeyConstraint, Table,
    UniqueConstraint,
};
use crate::{Result, SchemataError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAlteration {
    AddColumn(Column),
    DropColumn(String),
    RenameColumn { from: String, to: String },
    AddPrimaryKey(PrimaryKeyConstraint),
    DropPrimaryKey(PrimaryKeyConstraint),
    AddUnique(UniqueConstraint),
    DropUnique(UniqueConstraint),
    AddForeignKey(ForeignKeyConstraint),
    DropForeignKey(ForeignKeyConstraint),
    AddCheck(CheckConstraint),
    DropCheck(CheckConstraint),
    AddDefault(DefaultConstraint),
    DropDefault(DefaultConstraint),
}

impl TableAlteration {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TableAlteration::AddColumn(_) => "add column",
            TableAlteration::DropColumn(_) => "drop column",
            TableAlteration::RenameColumn { .. } => "rename column",
            TableAlteration::AddPrimaryKey(_) => "add primary key",
            TableAlteration::DropPrimaryKey(_) => "drop primary key",
            TableAlteration::AddUnique(_) => "add unique constraint",
            TableAlteration::DropUnique(_) => "drop unique constraint",
            TableAlteration::AddForeignKey(_) => "add foreign key",
            TableAlteration::DropForeignKey(_) => "drop foreign key",
            TableAlteration::AddCheck(_) => "add check constraint",
            TableAlteration::DropCheck(_) => "drop check constraint",
            TableAlteration::AddDefault(_) => "add default constraint",
            TableAlteration::DropDefault(_) => "drop default constraint",
        }
    }

    /// Apply the change to an in-memory table. Column-level declarations are
    /// hoisted to table level first, so the result carries every constraint
    /// exactly once.
    pub fn apply_to(&self, table: &mut Table) -> Result<()> {
        table.hoist_column_constraints();

        match self {
            TableAlteration::AddColumn(column) => {
                table.add_column(column.clone())?;
                table.hoist_column_constraints();
            }
            TableAlteration::DropColumn(name) => {
                let position = table
                    .columns
                    .iter()
                    .position(|c| c.column_name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| missing_column(table, name))?;
                table.columns.remove(position);
                drop_references(table, name);
            }
            TableAlteration::RenameColumn { from, to } => {
                if table.column(to).is_some() {
                    return Err(SchemataError::Schema(format!(
                        "table '{}' already has a column named '{}'",
                        table.table_name, to
                    )));
                }
                let column = table
                    .column_mut(from)
                    .ok_or_else(|| SchemataError::NotFound(format!("column '{}'", from)))?;
                column.column_name = to.clone();
                rename_references(table, from, to);
            }
            TableAlteration::AddPrimaryKey(pk) => {
                if table.primary_key.is_some() {
                    return Err(SchemataError::Schema(format!(
                        "table '{}' already has a primary key",
                        table.table_name
                    )));
                }
                for key in &pk.columns {
                    let column = table
                        .column_mut(&key.column_name)
                        .ok_or_else(|| SchemataError::NotFound(format!("column '{}'", key.column_name)))?;
                    column.is_nullable = false;
                }
                table.primary_key = Some(pk.clone());
            }
            TableAlteration::DropPrimaryKey(_) => {
                table.primary_key = None;
                for column in &mut table.columns {
                    column.is_auto_increment = false;
                }
            }
            TableAlteration::AddUnique(unique) => table.unique_constraints.push(unique.clone()),
            TableAlteration::DropUnique(unique) => table
                .unique_constraints
                .retain(|u| !u.constraint_name.eq_ignore_ascii_case(&unique.constraint_name)),
            TableAlteration::AddForeignKey(fk) => table.foreign_key_constraints.push(fk.clone()),
            TableAlteration::DropForeignKey(fk) => table
                .foreign_key_constraints
                .retain(|f| !f.constraint_name.eq_ignore_ascii_case(&fk.constraint_name)),
            TableAlteration::AddCheck(check) => table.check_constraints.push(check.clone()),
            TableAlteration::DropCheck(check) => table
                .check_constraints
                .retain(|c| !c.constraint_name.eq_ignore_ascii_case(&check.constraint_name)),
            TableAlteration::AddDefault(default) => {
                table
                    .default_constraints
                    .retain(|d| !d.column_name.eq_ignore_ascii_case(&default.column_name));
                table.default_constraints.push(default.clone());
            }
            TableAlteration::DropDefault(default) => table
                .default_constraints
                .retain(|d| !d.column_name.eq_ignore_ascii_case(&default.column_name)),
        }
        Ok(())
    }
}

fn missing_column(table: &Table, column: &str) -> SchemataError {
    SchemataError::NotFound(format!(
        "column '{}' on table '{}'",
        column, table.table_name
    ))
}

/// Remove every constraint and index that involves a dropped column.
fn drop_references(table: &mut Table, column: &str) {
    let is = |name: &str| name.eq_ignore_ascii_case(column);

    if table
        .primary_key
        .as_ref()
        .is_some_and(|pk| pk.columns.iter().any(|c| is(&c.column_name)))
    {
        table.primary_key = None;
    }
    table
        .default_constraints
        .retain(|d| !is(&d.column_name));
    table
        .check_constraints
        .retain(|c| !c.column_name.as_deref().is_some_and(is));
    table
        .unique_constraints
        .retain(|u| !u.columns.iter().any(|c| is(&c.column_name)));
    table
        .foreign_key_constraints
        .retain(|f| !f.columns.iter().any(|c| is(c)));
    table
        .indexes
        .retain(|i| !i.columns.iter().any(|c| is(&c.column_name)));
}

fn rename_references(table: &mut Table, from: &str, to: &str) {
    let rename = |name: &mut String| {
        if name.eq_ignore_ascii_case(from) {
            *name = to.to_string();
        }
    };

    if let Some(pk) = &mut table.primary_key {
        pk.columns.iter_mut().for_each(|c| rename(&mut c.column_name));
    }
    for default in &mut table.default_constraints {
        rename(&mut default.column_name);
    }
    for check in &mut table.check_constraints {
        if let Some(column) = &mut check.column_name {
            rename(column);
        }
    }
    for unique in &mut table.unique_constraints {
        unique.columns.iter_mut().for_each(|c| rename(&mut c.column_name));
    }
    for fk in &mut table.foreign_key_constraints {
        fk.columns.iter_mut().for_each(rename);
    }
    for index in &mut table.indexes {
        index.columns.iter_mut().for_each(|c| rename(&mut c.column_name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Index;
    use crate::typemap::HostType;

    fn accounts() -> Table {
        Table::new("accounts")
            .with_column(Column::new("id", HostType::I32).primary_key())
            .unwrap()
            .with_column(Column::new("email", HostType::String).unique().with_default("''"))
            .unwrap()
            .with_column(Column::new("owner", HostType::I32).references("users", "id"))
            .unwrap()
            .with_index(Index::new("accounts", ["owner", "email"]))
    }

    #[test]
    fn drop_column_removes_dependents() {
        let mut table = accounts();
        TableAlteration::DropColumn("EMAIL".into())
            .apply_to(&mut table)
            .unwrap();
        assert_eq!(table.column_names(), vec!["id", "owner"]);
        assert!(table.unique_constraints.is_empty());
        assert!(table.default_constraints.is_empty());
        assert!(table.indexes.is_empty());
        assert_eq!(table.foreign_key_constraints.len(), 1);
        assert!(table.primary_key.is_some());
    }

    #[test]
    fn hoisting_keeps_one_copy_of_each_constraint() {
        let mut table = accounts();
        TableAlteration::DropUnique(UniqueConstraint::new("accounts", ["email"]))
            .apply_to(&mut table)
            .unwrap();
        assert!(table.unique_constraints.is_empty());
        assert!(!table.column("email").unwrap().is_unique);
        assert!(table.effective_constraints().uniques.is_empty());
    }

    #[test]
    fn rename_column_follows_references() {
        let mut table = accounts();
        TableAlteration::RenameColumn {
            from: "owner".into(),
            to: "owner_id".into(),
        }
        .apply_to(&mut table)
        .unwrap();
        assert_eq!(table.foreign_key_constraints[0].columns, vec!["owner_id"]);
        assert_eq!(table.indexes[0].columns[0].column_name, "owner_id");
    }

    #[test]
    fn second_primary_key_is_rejected() {
        let mut table = accounts();
        let err = TableAlteration::AddPrimaryKey(PrimaryKeyConstraint::new("accounts", ["owner"]))
            .apply_to(&mut table)
            .unwrap_err();
        assert!(matches!(err, SchemataError::Schema(_)));
    }
}
