//! SQL Server DDL text

use super::MssqlSchema;
use schemata_core::model::{
    CheckConstraint, Column, DefaultConstraint, EffectiveConstraints, ForeignKeyConstraint, Index,
    PrimaryKeyConstraint, ReferentialAction, Table, UniqueConstraint,
};
use schemata_core::schema::{DialectSchema, TableAlteration};
use schemata_core::typemap::DialectTypeDescriptor;
use schemata_core::{Result, SchemataError};

const IDENTITY_TYPES: &[&str] = &["tinyint", "smallint", "int", "integer", "bigint"];

/// SQL Server has no `RESTRICT`; `NO ACTION` is the same check done at
/// statement end.
fn action_sql(action: ReferentialAction) -> &'static str {
    match action {
        ReferentialAction::Restrict => ReferentialAction::NoAction.as_sql(),
        other => other.as_sql(),
    }
}

fn is_identity_type(column_type: &str) -> bool {
    let parsed = DialectTypeDescriptor::parse(column_type);
    let base = parsed.base_without_modifiers();
    IDENTITY_TYPES.contains(&base)
        || (matches!(base, "decimal" | "numeric") && parsed.scale.unwrap_or(0) == 0)
}

impl MssqlSchema {
    /// `CREATE TABLE` with defaults and constraints inline. Indexes are
    /// separate statements.
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
            if !is_identity_type(&column_type) {
                return Err(SchemataError::Schema(format!(
                    "identity column '{}' must have an integer or decimal(p,0) type, not {}",
                    name, column_type
                )));
            }
            if default.is_some() {
                return Err(SchemataError::Schema(format!(
                    "identity column '{}' cannot also have a default",
                    name
                )));
            }
            definition.push_str(" IDENTITY(1,1)");
        }
        definition.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = default {
            definition.push_str(&format!(
                " CONSTRAINT {} DEFAULT {}",
                self.quote_identifier(&default.constraint_name),
                default.expression.trim()
            ));
        }
        Ok(definition)
    }

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
            self.key_list(&pk.columns, true)
        )
    }

    fn unique_clause(&self, unique: &UniqueConstraint) -> String {
        format!(
            "CONSTRAINT {} UNIQUE ({})",
            self.quote_identifier(&unique.constraint_name),
            self.key_list(&unique.columns, true)
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
            action_sql(fk.on_delete),
            action_sql(fk.on_update)
        )
    }

    fn default_clause(&self, default: &DefaultConstraint) -> String {
        format!(
            "CONSTRAINT {} DEFAULT {} FOR {}",
            self.quote_identifier(&default.constraint_name),
            default.expression.trim(),
            self.quote_identifier(&default.column_name)
        )
    }

    /// Both unique and plain indexes keep their column order.
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
            self.key_list(&index.columns, true)
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
            TableAlteration::DropColumn(name) => return Ok(self.drop_column_statements(table, name)),
            TableAlteration::RenameColumn { from, to } => vec![self.sp_rename(
                &format!("{}.{}", target, self.quote_identifier(from)),
                to,
                Some("COLUMN"),
            )],
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
            TableAlteration::AddDefault(default) => {
                vec![alter(format!("ADD {}", self.default_clause(default)))]
            }
            TableAlteration::DropPrimaryKey(PrimaryKeyConstraint { constraint_name, .. })
            | TableAlteration::DropUnique(UniqueConstraint { constraint_name, .. })
            | TableAlteration::DropCheck(CheckConstraint { constraint_name, .. })
            | TableAlteration::DropForeignKey(ForeignKeyConstraint { constraint_name, .. })
            | TableAlteration::DropDefault(DefaultConstraint { constraint_name, .. }) => {
                vec![alter(format!(
                    "DROP CONSTRAINT {}",
                    self.quote_identifier(constraint_name)
                ))]
            }
        };
        Ok(statements)
    }

    /// One `ALTER TABLE ... ADD` carrying the column and its constraints, then
    /// its indexes.
    fn add_column_statements(&self, table: &Table, column: &Column) -> Result<Vec<String>> {
        let schema = table.schema_name.as_deref();
        let own = Table::new(table.table_name.clone())
            .in_schema(schema)
            .with_column(column.clone())?;
        let constraints = own.effective_constraints();

        let mut parts = vec![self.column_definition(column, &constraints)?];
        parts.extend(self.constraint_clauses(schema, &constraints));

        let mut statements = vec![format!(
            "ALTER TABLE {} ADD {}",
            self.qualify(schema, &table.table_name),
            parts.join(", ")
        )];
        statements.extend(
            constraints
                .indexes
                .iter()
                .map(|index| self.index_statement(index, schema, &table.table_name)),
        );
        Ok(statements)
    }

    /// SQL Server refuses to drop a column while an index, default, check or
    /// key still uses it. Indexes go first as their own statements, then one
    /// `ALTER TABLE` drops the constraints and the column.
    fn drop_column_statements(&self, table: &Table, column_name: &str) -> Vec<String> {
        let schema = table.schema_name.as_deref();
        let target = self.qualify(schema, &table.table_name);
        let constraints = table.effective_constraints();

        let mut statements: Vec<String> = constraints
            .indexes
            .iter()
            .filter(|index| index.covers(column_name))
            .map(|index| {
                format!(
                    "DROP INDEX {} ON {}",
                    self.quote_identifier(&index.index_name),
                    target
                )
            })
            .collect();

        let mut dropped: Vec<&str> = Vec::new();
        dropped.extend(
            constraints
                .defaults
                .iter()
                .filter(|d| d.column_name.eq_ignore_ascii_case(column_name))
                .map(|d| d.constraint_name.as_str()),
        );
        dropped.extend(
            constraints
                .checks
                .iter()
                .filter(|check| check_uses_column(check, column_name))
                .map(|check| check.constraint_name.as_str()),
        );
        dropped.extend(
            constraints
                .uniques
                .iter()
                .filter(|u| names_column(u.columns.iter().map(|c| c.column_name.as_str()), column_name))
                .map(|u| u.constraint_name.as_str()),
        );
        dropped.extend(
            constraints
                .foreign_keys
                .iter()
                .filter(|fk| names_column(fk.columns.iter().map(String::as_str), column_name))
                .map(|fk| fk.constraint_name.as_str()),
        );
        if let Some(pk) = &constraints.primary_key
            && names_column(pk.columns.iter().map(|c| c.column_name.as_str()), column_name)
        {
            dropped.push(pk.constraint_name.as_str());
        }

        let mut actions: Vec<String> = dropped
            .iter()
            .map(|name| format!("CONSTRAINT {}", self.quote_identifier(name)))
            .collect();
        actions.push(format!("COLUMN {}", self.quote_identifier(column_name)));
        statements.push(format!("ALTER TABLE {} DROP {}", target, actions.join(", ")));
        statements
    }
}

fn names_column<'a>(mut columns: impl Iterator<Item = &'a str>, column_name: &str) -> bool {
    columns.any(|c| c.eq_ignore_ascii_case(column_name))
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
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '@' || c == '#'))
        .any(|word| word == wanted)
}
