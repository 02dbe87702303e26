//! MySQL DDL text

use super::MySqlSchema;
use schemata_core::model::{
    CheckConstraint, Column, EffectiveConstraints, ForeignKeyConstraint, Index,
    PrimaryKeyConstraint, Table, UniqueConstraint,
};
use schemata_core::schema::{DialectSchema, TableAlteration};
use schemata_core::typemap::DialectTypeDescriptor;
use schemata_core::{Result, SchemataError};

const AUTO_INCREMENT_TYPES: &[&str] = &[
    "tinyint", "smallint", "mediumint", "int", "integer", "bigint",
];

impl MySqlSchema {
    /// `CREATE TABLE` carrying every constraint and index inline.
    pub(super) fn create_table_statement(&self, table: &Table) -> Result<String> {
        table.validate()?;
        let constraints = table.effective_constraints();

        let mut definitions = Vec::with_capacity(table.columns.len() + 4);
        for column in &table.columns {
            definitions.push(self.column_definition(column, &constraints)?);
        }
        definitions.extend(self.constraint_clauses(&constraints));
        definitions.extend(constraints.indexes.iter().map(|index| self.inline_index(index)));

        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(&table.table_name),
            definitions.join(", ")
        ))
    }

    fn column_definition(&self, column: &Column, constraints: &EffectiveConstraints) -> Result<String> {
        let name = column.column_name.as_str();
        let column_type = self.resolve_column_type(column)?;
        let mut definition = format!("{} {}", self.quote_identifier(name), column_type);

        if !column.is_nullable {
            definition.push_str(" NOT NULL");
        }
        if let Some(default) = constraints
            .defaults
            .iter()
            .find(|d| d.column_name.eq_ignore_ascii_case(name))
        {
            definition.push_str(&format!(" DEFAULT {}", default.expression.trim()));
        }
        if column.is_auto_increment {
            let parsed = DialectTypeDescriptor::parse(&column_type);
            if !AUTO_INCREMENT_TYPES.contains(&parsed.base_without_modifiers()) {
                return Err(SchemataError::Schema(format!(
                    "auto-increment column '{}' must have an integer type, not {}",
                    name, column_type
                )));
            }
            definition.push_str(" AUTO_INCREMENT");
        }
        Ok(definition)
    }

    fn constraint_clauses(&self, constraints: &EffectiveConstraints) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(pk) = &constraints.primary_key {
            clauses.push(self.primary_key_clause(pk));
        }
        clauses.extend(constraints.uniques.iter().map(|u| self.unique_clause(u)));
        clauses.extend(constraints.checks.iter().map(|c| self.check_clause(c)));
        clauses.extend(constraints.foreign_keys.iter().map(|fk| self.foreign_key_clause(fk)));
        clauses
    }

    /// The key is always named `PRIMARY`, so the constraint name is not sent.
    fn primary_key_clause(&self, pk: &PrimaryKeyConstraint) -> String {
        format!("PRIMARY KEY ({})", self.key_list(&pk.columns, false))
    }

    fn unique_clause(&self, unique: &UniqueConstraint) -> String {
        format!(
            "CONSTRAINT {} UNIQUE ({})",
            self.quote_identifier(&unique.constraint_name),
            self.key_list(&unique.columns, false)
        )
    }

    fn check_clause(&self, check: &CheckConstraint) -> String {
        format!(
            "CONSTRAINT {} CHECK ({})",
            self.quote_identifier(&check.constraint_name),
            check.expression.trim()
        )
    }

    fn foreign_key_clause(&self, fk: &ForeignKeyConstraint) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(&fk.constraint_name),
            self.quote_list(&fk.columns.iter().map(String::as_str).collect::<Vec<_>>()),
            self.quote_identifier(&fk.referenced_table_name),
            self.quote_list(
                &fk.referenced_columns
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
            ),
            fk.on_delete,
            fk.on_update
        )
    }

    /// `INDEX name` or `UNIQUE INDEX name`, shared by the inline and
    /// standalone forms.
    pub(super) fn index_clause(&self, index: &Index) -> String {
        format!(
            "{}INDEX {}",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.index_name)
        )
    }

    fn inline_index(&self, index: &Index) -> String {
        format!(
            "{} ({})",
            self.index_clause(index),
            self.key_list(&index.columns, !index.is_unique)
        )
    }

    pub(super) fn alteration_statements(
        &self,
        table: &Table,
        alteration: &TableAlteration,
    ) -> Result<Vec<String>> {
        let target = self.quote_identifier(&table.table_name);
        let alter = |actions: Vec<String>| format!("ALTER TABLE {} {}", target, actions.join(", "));

        let statement = match alteration {
            TableAlteration::AddColumn(column) => alter(self.add_column_actions(table, column)?),
            TableAlteration::DropColumn(name) => alter(self.drop_column_actions(table, name)),
            TableAlteration::RenameColumn { from, to } => alter(vec![format!(
                "RENAME COLUMN {} TO {}",
                self.quote_identifier(from),
                self.quote_identifier(to)
            )]),
            TableAlteration::AddPrimaryKey(pk) => {
                alter(vec![format!("ADD {}", self.primary_key_clause(pk))])
            }
            TableAlteration::DropPrimaryKey(_) => alter(vec!["DROP PRIMARY KEY".to_string()]),
            TableAlteration::AddUnique(unique) => {
                alter(vec![format!("ADD {}", self.unique_clause(unique))])
            }
            TableAlteration::DropUnique(unique) => alter(vec![format!(
                "DROP INDEX {}",
                self.quote_identifier(&unique.constraint_name)
            )]),
            TableAlteration::AddForeignKey(fk) => {
                alter(vec![format!("ADD {}", self.foreign_key_clause(fk))])
            }
            TableAlteration::DropForeignKey(fk) => alter(vec![format!(
                "DROP FOREIGN KEY {}",
                self.quote_identifier(&fk.constraint_name)
            )]),
            TableAlteration::AddCheck(check) => {
                alter(vec![format!("ADD {}", self.check_clause(check))])
            }
            TableAlteration::DropCheck(check) => alter(vec![format!(
                "DROP CHECK {}",
                self.quote_identifier(&check.constraint_name)
            )]),
            TableAlteration::AddDefault(default) => alter(vec![format!(
                "ALTER COLUMN {} SET DEFAULT {}",
                self.quote_identifier(&default.column_name),
                default.expression.trim()
            )]),
            TableAlteration::DropDefault(default) => alter(vec![format!(
                "ALTER COLUMN {} DROP DEFAULT",
                self.quote_identifier(&default.column_name)
            )]),
        };
        Ok(vec![statement])
    }

    fn add_column_actions(&self, table: &Table, column: &Column) -> Result<Vec<String>> {
        let own = Table::new(table.table_name.clone()).with_column(column.clone())?;
        let constraints = own.effective_constraints();

        let mut actions = vec![format!(
            "ADD COLUMN {}",
            self.column_definition(column, &constraints)?
        )];
        actions.extend(
            self.constraint_clauses(&constraints)
                .into_iter()
                .chain(constraints.indexes.iter().map(|index| self.inline_index(index)))
                .map(|clause| format!("ADD {}", clause)),
        );
        Ok(actions)
    }

    /// MySQL refuses to drop a column that a foreign key or check constraint
    /// still uses, so those go first in the same statement.
    fn drop_column_actions(&self, table: &Table, column_name: &str) -> Vec<String> {
        let constraints = table.effective_constraints();
        let mut actions: Vec<String> = constraints
            .foreign_keys
            .iter()
            .filter(|fk| fk.columns.iter().any(|c| c.eq_ignore_ascii_case(column_name)))
            .map(|fk| format!("DROP FOREIGN KEY {}", self.quote_identifier(&fk.constraint_name)))
            .collect();
        actions.extend(
            constraints
                .checks
                .iter()
                .filter(|check| check_uses_column(check, column_name))
                .map(|check| format!("DROP CHECK {}", self.quote_identifier(&check.constraint_name))),
        );
        actions.push(format!("DROP COLUMN {}", self.quote_identifier(column_name)));
        actions
    }
}

/// Whether a check names the column, either as its owner or as a whole word in
/// its expression.
pub(super) fn check_uses_column(check: &CheckConstraint, column_name: &str) -> bool {
    if check
        .column_name
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(column_name))
    {
        return true;
    }
    let wanted = column_name.to_ascii_lowercase();
    check
        .expression
        .to_ascii_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .any(|word| word == wanted)
}
