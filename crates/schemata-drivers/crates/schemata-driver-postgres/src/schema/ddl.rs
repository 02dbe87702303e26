//! PostgreSQL DDL text

use super::PostgresSchema;
use schemata_core::model::{
    CheckConstraint, Column, EffectiveConstraints, ForeignKeyConstraint, Index,
    PrimaryKeyConstraint, Table, UniqueConstraint,
};
use schemata_core::schema::{DialectSchema, TableAlteration};
use schemata_core::{Result, SchemataError};

const IDENTITY_TYPES: &[&str] = &["smallint", "integer", "bigint", "int2", "int4", "int8"];

impl PostgresSchema {
    /// `CREATE TABLE` with every constraint inline. Indexes are separate
    /// statements.
    pub(super) fn create_table_statement(&self, table: &Table) -> Result<String> {
        table.validate()?;
        let schema = table.schema_name.as_deref();
        let constraints = table.effective_constraints();

        let mut definitions = Vec::with_capacity(table.columns.len() + 4);
        for column in &table.columns {
            definitions.push(self.column_definition(column, &constraints)?);
        }
        definitions.extend(self.constraint_clauses(schema, &constraints));

        Ok(format!(
            "CREATE TABLE {} ({})",
            self.qualify(schema, &table.table_name),
            definitions.join(", ")
        ))
    }

    fn column_definition(&self, column: &Column, constraints: &EffectiveConstraints) -> Result<String> {
        let name = column.column_name.as_str();
        let column_type = self.resolve_column_type(column)?;
        let mut definition = format!("{} {}", self.quote_identifier(name), column_type);

        let default = constraints
            .defaults
            .iter()
            .find(|d| d.column_name.eq_ignore_ascii_case(name));

        if column.is_auto_increment {
            if !IDENTITY_TYPES.contains(&column_type.to_ascii_lowercase().as_str()) {
                return Err(SchemataError::Schema(format!(
                    "identity column '{}' must be smallint, integer or bigint, not {}",
                    name, column_type
                )));
            }
            if default.is_some() {
                return Err(SchemataError::Schema(format!(
                    "identity column '{}' cannot also have a default",
                    name
                )));
            }
            definition.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        if !column.is_nullable {
            definition.push_str(" NOT NULL");
        }
        if let Some(default) = default {
            definition.push_str(&format!(" DEFAULT {}", default.expression.trim()));
        }
        Ok(definition)
    }

    /// Table-level clauses in the order PostgreSQL resolves them: key, unique,
    /// check, then foreign keys.
    fn constraint_clauses(
        &self,
        schema: Option<&str>,
        constraints: &EffectiveConstraints,
    ) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(pk) = &constraints.primary_key {
            clauses.push(self.primary_key_clause(pk));
        }
        clauses.extend(constraints.uniques.iter().map(|u| self.unique_clause(u)));
        clauses.extend(constraints.checks.iter().map(|c| self.check_clause(c)));
        clauses.extend(
            constraints
                .foreign_keys
                .iter()
                .map(|fk| self.foreign_key_clause(fk, schema)),
        );
        clauses
    }

    fn primary_key_clause(&self, pk: &PrimaryKeyConstraint) -> String {
        format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_identifier(&pk.constraint_name),
            self.key_list(&pk.columns, false)
        )
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

    /// A reference without a schema points into the referencing table's schema.
    fn foreign_key_clause(&self, fk: &ForeignKeyConstraint, table_schema: Option<&str>) -> String {
        let referenced_schema = fk.referenced_schema_name.as_deref().or(table_schema);
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(&fk.constraint_name),
            self.quote_list(&fk.columns.iter().map(String::as_str).collect::<Vec<_>>()),
            self.qualify(referenced_schema, &fk.referenced_table_name),
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

    /// Unique indexes drop ASC/DESC like unique constraints; plain indexes
    /// keep it.
    pub(super) fn index_statement(
        &self,
        index: &Index,
        schema: Option<&str>,
        table_name: &str,
    ) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.index_name),
            self.qualify(schema, table_name),
            self.key_list(&index.columns, !index.is_unique)
        )
    }

    pub(super) fn alteration_statements(
        &self,
        table: &Table,
        alteration: &TableAlteration,
    ) -> Result<Vec<String>> {
        let schema = table.schema_name.as_deref();
        let target = self.qualify(schema, &table.table_name);
        let alter = |action: String| format!("ALTER TABLE {} {}", target, action);

        let statements = match alteration {
            TableAlteration::AddColumn(column) => {
                return self.add_column_statements(table, column);
            }
            TableAlteration::DropColumn(name) => {
                vec![alter(format!("DROP COLUMN {}", self.quote_identifier(name)))]
            }
            TableAlteration::RenameColumn { from, to } => vec![alter(format!(
                "RENAME COLUMN {} TO {}",
                self.quote_identifier(from),
                self.quote_identifier(to)
            ))],
            TableAlteration::AddPrimaryKey(pk) => {
                vec![alter(format!("ADD {}", self.primary_key_clause(pk)))]
            }
            TableAlteration::AddUnique(unique) => {
                vec![alter(format!("ADD {}", self.unique_clause(unique)))]
            }
            TableAlteration::AddCheck(check) => {
                vec![alter(format!("ADD {}", self.check_clause(check)))]
            }
            TableAlteration::AddForeignKey(fk) => {
                vec![alter(format!("ADD {}", self.foreign_key_clause(fk, schema)))]
            }
            TableAlteration::DropPrimaryKey(PrimaryKeyConstraint { constraint_name, .. })
            | TableAlteration::DropUnique(UniqueConstraint { constraint_name, .. })
            | TableAlteration::DropCheck(CheckConstraint { constraint_name, .. })
            | TableAlteration::DropForeignKey(ForeignKeyConstraint { constraint_name, .. }) => {
                vec![alter(format!(
                    "DROP CONSTRAINT {}",
                    self.quote_identifier(constraint_name)
                ))]
            }
            TableAlteration::AddDefault(default) => vec![alter(format!(
                "ALTER COLUMN {} SET DEFAULT {}",
                self.quote_identifier(&default.column_name),
                default.expression.trim()
            ))],
            TableAlteration::DropDefault(default) => vec![alter(format!(
                "ALTER COLUMN {} DROP DEFAULT",
                self.quote_identifier(&default.column_name)
            ))],
        };
        Ok(statements)
    }

    /// One `ALTER TABLE` adding the column and its constraints, then its
    /// indexes.
    fn add_column_statements(&self, table: &Table, column: &Column) -> Result<Vec<String>> {
        let schema = table.schema_name.as_deref();
        let own = Table::new(table.table_name.clone())
            .in_schema(schema)
            .with_column(column.clone())?;
        let constraints = own.effective_constraints();

        let mut actions = vec![format!(
            "ADD COLUMN {}",
            self.column_definition(column, &constraints)?
        )];
        actions.extend(
            self.constraint_clauses(schema, &constraints)
                .into_iter()
                .map(|clause| format!("ADD {}", clause)),
        );

        let mut statements = vec![format!(
            "ALTER TABLE {} {}",
            self.qualify(schema, &table.table_name),
            actions.join(", ")
        )];
        statements.extend(
            constraints
                .indexes
                .iter()
                .map(|index| self.index_statement(index, schema, &table.table_name)),
        );
        Ok(statements)
    }
}
