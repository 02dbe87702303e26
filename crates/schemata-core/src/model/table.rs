use super::{
    CheckConstraint, Column, ColumnForeignKey, DefaultConstraint, ForeignKeyConstraint, Index,
    OrderedColumn, PrimaryKeyConstraint, UniqueConstraint, naming,
};
use crate::{Result, SchemataError};
use serde::{Deserialize, Serialize};

/// A table: ordered columns plus table-level constraints and indexes.
///
/// Constraints may be declared on the table or on the columns; drivers work from
/// [`Table::effective_constraints`], which folds the two together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKeyConstraint>,
    pub check_constraints: Vec<CheckConstraint>,
    pub default_constraints: Vec<DefaultConstraint>,
    pub unique_constraints: Vec<UniqueConstraint>,
    pub foreign_key_constraints: Vec<ForeignKeyConstraint>,
    pub indexes: Vec<Index>,
}

/// Every constraint and index a table carries, with column-level declarations
/// folded in and named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveConstraints {
    pub primary_key: Option<PrimaryKeyConstraint>,
    pub checks: Vec<CheckConstraint>,
    pub defaults: Vec<DefaultConstraint>,
    pub uniques: Vec<UniqueConstraint>,
    pub foreign_keys: Vec<ForeignKeyConstraint>,
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn in_schema(mut self, schema_name: Option<&str>) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self
    }

    /// Build a table from columns, rejecting duplicate names.
    pub fn with_columns(
        table_name: impl Into<String>,
        columns: impl IntoIterator<Item = Column>,
    ) -> Result<Self> {
        let mut table = Self::new(table_name);
        for column in columns {
            table.add_column(column)?;
        }
        Ok(table)
    }

    /// Append a column. Names compare case-insensitively.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        column.validate()?;
        if self.column(&column.column_name).is_some() {
            return Err(SchemataError::Schema(format!(
                "table '{}' already has a column named '{}'",
                self.table_name, column.column_name
            )));
        }
        let column = column.in_table(self.schema_name.as_deref(), &self.table_name);
        self.columns.push(column);
        Ok(())
    }

    pub fn with_column(mut self, column: Column) -> Result<Self> {
        self.add_column(column)?;
        Ok(self)
    }

    pub fn with_primary_key<C: Into<OrderedColumn>>(
        mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        self.primary_key = Some(
            PrimaryKeyConstraint::new(self.table_name.clone(), columns)
                .in_schema(self.schema_name.as_deref()),
        );
        self
    }

    pub fn with_check(mut self, check: CheckConstraint) -> Self {
        self.check_constraints.push(CheckConstraint {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            ..check
        });
        self
    }

    pub fn with_default(mut self, default: DefaultConstraint) -> Self {
        self.default_constraints.push(DefaultConstraint {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            ..default
        });
        self
    }

    pub fn with_unique(mut self, unique: UniqueConstraint) -> Self {
        self.unique_constraints.push(UniqueConstraint {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            ..unique
        });
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyConstraint) -> Self {
        self.foreign_key_constraints.push(ForeignKeyConstraint {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            ..foreign_key
        });
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(Index {
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            ..index
        });
        self
    }

    pub fn column(&self, column_name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.column_name.eq_ignore_ascii_case(column_name))
    }

    pub fn column_mut(&mut self, column_name: &str) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.column_name.eq_ignore_ascii_case(column_name))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }

    /// Check every column, and that names are unique.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(SchemataError::Schema("table name must not be empty".into()));
        }
        if self.columns.is_empty() {
            return Err(SchemataError::Schema(format!(
                "table '{}' has no columns",
                self.table_name
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            column.validate()?;
            let duplicate = self.columns[..i]
                .iter()
                .any(|c| c.column_name.eq_ignore_ascii_case(&column.column_name));
            if duplicate {
                return Err(SchemataError::Schema(format!(
                    "table '{}' already has a column named '{}'",
                    self.table_name, column.column_name
                )));
            }
        }
        Ok(())
    }

    /// Table-level constraints plus the ones declared on columns, each named.
    /// A column-level declaration already covered at table level is skipped.
    pub fn effective_constraints(&self) -> EffectiveConstraints {
        let table = self.table_name.as_str();
        let schema = self.schema_name.as_deref();

        let primary_key = self.primary_key.clone().or_else(|| {
            let key_columns: Vec<&Column> =
                self.columns.iter().filter(|c| c.is_primary_key).collect();
            let first = key_columns.first()?;
            let mut pk = PrimaryKeyConstraint::new(
                table,
                key_columns.iter().map(|c| c.column_name.as_str()),
            )
            .in_schema(schema);
            if let Some(name) = &first.primary_key_constraint_name {
                pk = pk.named(name.clone());
            }
            Some(pk)
        });

        let mut defaults = self.default_constraints.clone();
        let mut checks = self.check_constraints.clone();
        let mut uniques = self.unique_constraints.clone();
        let mut foreign_keys = self.foreign_key_constraints.clone();
        let mut indexes = self.indexes.clone();

        for column in &self.columns {
            let name = column.column_name.as_str();

            if let Some(expression) = &column.default_expression
                && !defaults.iter().any(|d| d.column_name.eq_ignore_ascii_case(name))
            {
                let mut default = DefaultConstraint::new(table, name, expression.clone())
                    .in_schema(schema);
                if let Some(constraint_name) = &column.default_constraint_name {
                    default = default.named(constraint_name.clone());
                }
                defaults.push(default);
            }

            if let Some(expression) = &column.check_expression
                && !checks.iter().any(|c| {
                    c.column_name
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(name))
                })
            {
                let mut check =
                    CheckConstraint::new(table, Some(name), expression.clone()).in_schema(schema);
                if let Some(constraint_name) = &column.check_constraint_name {
                    check = check.named(constraint_name.clone());
                }
                checks.push(check);
            }

            let is_sole_key = primary_key.as_ref().is_some_and(|pk| {
                pk.columns.len() == 1 && pk.columns[0].column_name.eq_ignore_ascii_case(name)
            });
            if column.is_unique
                && !is_sole_key
                && !uniques.iter().any(|u| covers_exactly(&u.column_names(), name))
                && !indexes
                    .iter()
                    .any(|i| i.is_unique && covers_exactly(&i.column_names(), name))
            {
                let mut unique = UniqueConstraint::new(table, [name]).in_schema(schema);
                if let Some(constraint_name) = &column.unique_constraint_name {
                    unique = unique.named(constraint_name.clone());
                }
                uniques.push(unique);
            }

            if let Some(fk) = &column.foreign_key
                && !foreign_keys.iter().any(|f| {
                    let cols: Vec<&str> = f.columns.iter().map(String::as_str).collect();
                    covers_exactly(&cols, name)
                })
            {
                foreign_keys.push(column_foreign_key(table, schema, name, fk));
            }

            if column.is_indexed
                && !indexes.iter().any(|i| {
                    i.columns
                        .first()
                        .is_some_and(|c| c.column_name.eq_ignore_ascii_case(name))
                })
            {
                let mut index = Index::new(table, [name]).in_schema(schema);
                if let Some(index_name) = &column.index_name {
                    index = index.named(index_name.clone());
                }
                indexes.push(index);
            }
        }

        EffectiveConstraints {
            primary_key,
            checks,
            defaults,
            uniques,
            foreign_keys,
            indexes,
        }
    }

    /// Move column-level declarations into the table-level lists and clear the
    /// column flags. Nullability and auto-increment stay on the columns.
    pub fn hoist_column_constraints(&mut self) {
        let effective = self.effective_constraints();
        self.primary_key = effective.primary_key;
        self.check_constraints = effective.checks;
        self.default_constraints = effective.defaults;
        self.unique_constraints = effective.uniques;
        self.foreign_key_constraints = effective.foreign_keys;
        self.indexes = effective.indexes;

        for column in &mut self.columns {
            column.is_primary_key = false;
            column.primary_key_constraint_name = None;
            column.default_expression = None;
            column.default_constraint_name = None;
            column.check_expression = None;
            column.check_constraint_name = None;
            column.is_unique = false;
            column.unique_constraint_name = None;
            column.is_indexed = false;
            column.index_name = None;
            column.foreign_key = None;
        }
    }

    /// Mirror table-level constraints onto column flags. Introspection calls
    /// this after loading constraints so both views of the table agree.
    pub fn sync_column_flags(&mut self) {
        let primary_key = self.primary_key.clone();
        let defaults = self.default_constraints.clone();
        let checks = self.check_constraints.clone();
        let uniques = self.unique_constraints.clone();
        let foreign_keys = self.foreign_key_constraints.clone();
        let indexes = self.indexes.clone();

        for column in &mut self.columns {
            let name = column.column_name.clone();

            if let Some(pk) = &primary_key
                && pk.columns.iter().any(|c| c.column_name.eq_ignore_ascii_case(&name))
            {
                column.is_primary_key = true;
                column.primary_key_constraint_name = Some(pk.constraint_name.clone());
            }

            if let Some(default) = defaults
                .iter()
                .find(|d| d.column_name.eq_ignore_ascii_case(&name))
            {
                column.default_expression = Some(default.expression.clone());
                column.default_constraint_name = Some(default.constraint_name.clone());
            }

            if let Some(check) = checks.iter().find(|c| {
                c.column_name
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(&name))
            }) {
                column.check_expression = Some(check.expression.clone());
                column.check_constraint_name = Some(check.constraint_name.clone());
            }

            if let Some(unique) = uniques
                .iter()
                .find(|u| covers_exactly(&u.column_names(), &name))
            {
                column.is_unique = true;
                column.unique_constraint_name = Some(unique.constraint_name.clone());
            } else if indexes
                .iter()
                .any(|i| i.is_unique && covers_exactly(&i.column_names(), &name))
            {
                column.is_unique = true;
            }

            if let Some(index) = indexes.iter().find(|i| {
                i.columns
                    .first()
                    .is_some_and(|c| c.column_name.eq_ignore_ascii_case(&name))
            }) {
                column.is_indexed = true;
                column.index_name = Some(index.index_name.clone());
            }

            if let Some(fk) = foreign_keys.iter().find(|f| {
                let cols: Vec<&str> = f.columns.iter().map(String::as_str).collect();
                covers_exactly(&cols, &name)
            }) {
                column.foreign_key = Some(ColumnForeignKey {
                    constraint_name: Some(fk.constraint_name.clone()),
                    referenced_schema_name: fk.referenced_schema_name.clone(),
                    referenced_table_name: fk.referenced_table_name.clone(),
                    referenced_column_name: fk
                        .referenced_columns
                        .first()
                        .cloned()
                        .unwrap_or_default(),
                    on_delete: fk.on_delete,
                    on_update: fk.on_update,
                });
            }
        }
    }
}

fn covers_exactly(columns: &[&str], name: &str) -> bool {
    columns.len() == 1 && columns[0].eq_ignore_ascii_case(name)
}

fn column_foreign_key(
    table: &str,
    schema: Option<&str>,
    column: &str,
    fk: &ColumnForeignKey,
) -> ForeignKeyConstraint {
    let mut constraint = ForeignKeyConstraint::new(
        table,
        &[column],
        fk.referenced_table_name.clone(),
        &[fk.referenced_column_name.as_str()],
    )
    .in_schema(schema)
    .referencing_schema(fk.referenced_schema_name.as_deref())
    .on_delete(fk.on_delete)
    .on_update(fk.on_update);
    if let Some(name) = &fk.constraint_name {
        constraint = constraint.named(name.clone());
    }
    constraint
}

/// Name of a column's default constraint, `df_{table}_{column}` unless the
/// column names one.
pub fn default_constraint_name_for(column: &Column) -> String {
    column
        .default_constraint_name
        .clone()
        .unwrap_or_else(|| naming::default_constraint(&column.table_name, &column.column_name))
}
