//! Constraint entities

use super::naming;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort order of a key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// A column reference inside a key, with its order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderedColumn {
    pub column_name: String,
    pub order: SortOrder,
}

impl OrderedColumn {
    pub fn asc(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            order: SortOrder::Descending,
        }
    }
}

impl From<&str> for OrderedColumn {
    fn from(column_name: &str) -> Self {
        OrderedColumn::asc(column_name)
    }
}

impl From<String> for OrderedColumn {
    fn from(column_name: String) -> Self {
        OrderedColumn::asc(column_name)
    }
}

/// Foreign key action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse a catalog rule: `SET NULL`, `SET_NULL`, `set null` or the PostgreSQL
    /// single-letter codes. Unknown text reads as `NoAction`.
    pub fn from_catalog(rule: &str) -> Self {
        let rule = rule.trim().to_ascii_uppercase().replace('_', " ");
        match rule.as_str() {
            "RESTRICT" | "R" => ReferentialAction::Restrict,
            "CASCADE" | "C" => ReferentialAction::Cascade,
            "SET NULL" | "N" => ReferentialAction::SetNull,
            "SET DEFAULT" | "D" => ReferentialAction::SetDefault,
            _ => ReferentialAction::NoAction,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyConstraint {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub constraint_name: String,
    pub columns: Vec<OrderedColumn>,
}

impl PrimaryKeyConstraint {
    /// Named `pk_{table}` until [`named`](Self::named) says otherwise.
    pub fn new<C: Into<OrderedColumn>>(
        table_name: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        let table_name = table_name.into();
        Self {
            schema_name: None,
            constraint_name: naming::primary_key(&table_name),
            table_name,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn named(mut self, constraint_name: impl Into<String>) -> Self {
        self.constraint_name = constraint_name.into();
        self
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub constraint_name: String,
    pub columns: Vec<OrderedColumn>,
}

impl UniqueConstraint {
    /// Named `uc_{table}_{columns}` until renamed.
    pub fn new<C: Into<OrderedColumn>>(
        table_name: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        let table_name = table_name.into();
        let columns: Vec<OrderedColumn> = columns.into_iter().map(Into::into).collect();
        let names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
        Self {
            schema_name: None,
            constraint_name: naming::unique_constraint(&table_name, &names),
            table_name,
            columns,
        }
    }

    pub fn named(mut self, constraint_name: impl Into<String>) -> Self {
        self.constraint_name = constraint_name.into();
        self
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub constraint_name: String,
    pub columns: Vec<String>,
    pub referenced_schema_name: Option<String>,
    pub referenced_table_name: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKeyConstraint {
    pub fn new(
        table_name: impl Into<String>,
        columns: &[&str],
        referenced_table_name: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        let table_name = table_name.into();
        let referenced_table_name = referenced_table_name.into();
        Self {
            schema_name: None,
            constraint_name: naming::foreign_key(
                &table_name,
                columns,
                &referenced_table_name,
                referenced_columns,
            ),
            table_name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            referenced_schema_name: None,
            referenced_table_name,
            referenced_columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    pub fn named(mut self, constraint_name: impl Into<String>) -> Self {
        self.constraint_name = constraint_name.into();
        self
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }

    pub fn referencing_schema(mut self, schema_name: Option<&str>) -> Self {
        self.referenced_schema_name = schema_name.map(str::to_string);
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub schema_name: Option<String>,
    pub table_name: String,
    /// Set for column-level checks
    pub column_name: Option<String>,
    pub constraint_name: String,
    pub expression: String,
}

impl CheckConstraint {
    pub fn new(
        table_name: impl Into<String>,
        column_name: Option<&str>,
        expression: impl Into<String>,
    ) -> Self {
        let table_name = table_name.into();
        Self {
            schema_name: None,
            constraint_name: naming::check_constraint(&table_name, column_name),
            table_name,
            column_name: column_name.map(str::to_string),
            expression: expression.into(),
        }
    }

    pub fn named(mut self, constraint_name: impl Into<String>) -> Self {
        self.constraint_name = constraint_name.into();
        self
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultConstraint {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub column_name: String,
    pub constraint_name: String,
    pub expression: String,
}

impl DefaultConstraint {
    /// Named `df_{table}_{column}`, the name every driver reports for
    /// defaults its catalog keeps no name for.
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        let table_name = table_name.into();
        let column_name = column_name.into();
        Self {
            schema_name: None,
            constraint_name: naming::default_constraint(&table_name, &column_name),
            table_name,
            column_name,
            expression: expression.into(),
        }
    }

    pub fn named(mut self, constraint_name: impl Into<String>) -> Self {
        self.constraint_name = constraint_name.into();
        self
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }
}
