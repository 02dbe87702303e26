//! SQLite DDL text

use super::SqliteSchema;
use schemata_core::model::{
    Column, EffectiveConstraints, ForeignKeyConstraint, Index, OrderedColumn, Table,
};
use schemata_core::schema::{DialectSchema, TableAlteration};
use schemata_core::{Result, SchemataError};

impl SqliteSchema {
    /// `CREATE TABLE` without the table's indexes.
    pub(super) fn create_table_statement(&self, table: &Table) -> Result<String> {
        table.validate()?;
        let constraints = table.effective_constraints();
        let rowid_key = rowid_key_column(table, &constraints)?;

        let mut definitions = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            let is_rowid_key = rowid_key.is_some_and(|name| name == column.column_name);
            definitions.push(self.column_definition(column, &constraints, is_rowid_key)?);
        }

        if let Some(pk) = &constraints.primary_key
            && rowid_key.is_none()
        {
            definitions.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.quote_identifier(&pk.constraint_name),
                self.key_list(&pk.columns, true)
            ));
        }
        for unique in &constraints.uniques {
            definitions.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(&unique.constraint_name),
                self.key_list(&unique.columns, true)
            ));
        }
        for check in constraints.checks.iter().filter(|c| c.column_name.is_none()) {
            definitions.push(format!(
                "CONSTRAINT {} CHECK ({})",
                self.quote_identifier(&check.constraint_name),
                check.expression
            ));
        }
        for fk in &constraints.foreign_keys {
            definitions.push(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) {}",
                self.quote_identifier(&fk.constraint_name),
                self.quote_list(&fk.columns.iter().map(String::as_str).collect::<Vec<_>>()),
                self.references_clause(fk)
            ));
        }

        Ok(format!(
            "CREATE TABLE {} ({})",
            self.qualify(None, &table.table_name),
            definitions.join(", ")
        ))
    }

    /// A column with its inline clauses: the rowid key, NOT NULL, the named
    /// default and any column-level checks.
    fn column_definition(
        &self,
        column: &Column,
        constraints: &EffectiveConstraints,
        is_rowid_key: bool,
    ) -> Result<String> {
        let name = column.column_name.as_str();
        let mut definition = if is_rowid_key {
            // only this exact spelling aliases the rowid
            format!("{} INTEGER", self.quote_identifier(name))
        } else {
            format!(
                "{} {}",
                self.quote_identifier(name),
                self.resolve_column_type(column)?
            )
        };

        if is_rowid_key && let Some(pk) = &constraints.primary_key {
            definition.push_str(&format!(
                " CONSTRAINT {} PRIMARY KEY AUTOINCREMENT",
                self.quote_identifier(&pk.constraint_name)
            ));
        } else if !column.is_nullable {
            definition.push_str(" NOT NULL");
        }

        if let Some(default) = constraints
            .defaults
            .iter()
            .find(|d| d.column_name.eq_ignore_ascii_case(name))
        {
            definition.push_str(&format!(
                " CONSTRAINT {} DEFAULT {}",
                self.quote_identifier(&default.constraint_name),
                default_value(&default.expression)
            ));
        }

        for check in constraints.checks.iter().filter(|c| {
            c.column_name
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(name))
        }) {
            definition.push_str(&format!(
                " CONSTRAINT {} CHECK ({})",
                self.quote_identifier(&check.constraint_name),
                check.expression
            ));
        }
        Ok(definition)
    }

    fn references_clause(&self, fk: &ForeignKeyConstraint) -> String {
        format!(
            "REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
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

    pub(super) fn index_statement(&self, index: &Index, table_name: &str) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.index_name),
            self.quote_identifier(table_name),
            self.key_list(&index.columns, true)
        )
    }

    /// `ALTER TABLE ... ADD COLUMN` for a column [`adds_in_place`] accepts, plus
    /// its index.
    pub(super) fn add_column_statements(&self, table: &Table, column: &Column) -> Result<Vec<String>> {
        let own = Table::new(table.table_name.clone()).with_column(column.clone())?;
        let constraints = own.effective_constraints();
        let mut definition = self.column_definition(column, &constraints, false)?;
        if let Some(fk) = constraints.foreign_keys.first() {
            definition.push_str(&format!(
                " CONSTRAINT {} {}",
                self.quote_identifier(&fk.constraint_name),
                self.references_clause(fk)
            ));
        }

        let mut statements = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualify(None, &table.table_name),
            definition
        )];
        statements.extend(
            constraints
                .indexes
                .iter()
                .map(|index| self.index_statement(index, &table.table_name)),
        );
        Ok(statements)
    }

    /// Recreate `table` in the altered shape under a scratch name, copy the
    /// surviving columns, swap it in and rebuild the indexes.
    pub(super) fn rebuild_statements(
        &self,
        table: &Table,
        alteration: &TableAlteration,
    ) -> Result<Vec<String>> {
        let mut target = table.clone();
        alteration.apply_to(&mut target)?;

        let scratch_name = format!("_{}_rebuild", table.table_name);
        let mut scratch = target.clone();
        scratch.table_name = scratch_name.clone();

        let carried: Vec<&str> = target
            .columns
            .iter()
            .filter(|c| table.column(&c.column_name).is_some())
            .map(|c| c.column_name.as_str())
            .collect();

        let mut statements = vec![self.create_table_statement(&scratch)?];
        if !carried.is_empty() {
            statements.push(format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                self.quote_identifier(&scratch_name),
                self.quote_list(&carried),
                self.quote_list(&carried),
                self.quote_identifier(&table.table_name)
            ));
        }
        statements.push(format!("DROP TABLE {}", self.quote_identifier(&table.table_name)));
        statements.push(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(&scratch_name),
            self.quote_identifier(&target.table_name)
        ));
        statements.extend(
            target
                .indexes
                .iter()
                .map(|index| self.index_statement(index, &target.table_name)),
        );
        Ok(statements)
    }
}

/// The auto-increment column, which must be the table's whole primary key.
fn rowid_key_column<'a>(
    table: &'a Table,
    constraints: &EffectiveConstraints,
) -> Result<Option<&'a str>> {
    let Some(column) = table.columns.iter().find(|c| c.is_auto_increment) else {
        return Ok(None);
    };
    let name = column.column_name.as_str();

    if column.host_type.as_ref().is_some_and(|host| !host.is_integer()) {
        return Err(SchemataError::Schema(format!(
            "auto-increment column '{}' must have an integer type",
            name
        )));
    }
    let is_whole_key = constraints.primary_key.as_ref().is_some_and(|pk| {
        matches!(pk.columns.as_slice(), [OrderedColumn { column_name, .. }] if column_name.eq_ignore_ascii_case(name))
    });
    if !is_whole_key {
        return Err(SchemataError::Schema(format!(
            "SQLite auto-increment column '{}' must be the table's only primary key column",
            name
        )));
    }
    Ok(Some(name))
}

/// Whether `ALTER TABLE ... ADD COLUMN` can add the column as declared.
pub(super) fn adds_in_place(column: &Column) -> bool {
    if column.is_primary_key || column.is_unique || column.is_auto_increment {
        return false;
    }
    let default = column.default_expression.as_deref().map(str::trim);
    let has_null_default = default.is_none_or(|d| d.eq_ignore_ascii_case("null"));
    if !column.is_nullable && has_null_default {
        return false;
    }
    if column.foreign_key.is_some() && !has_null_default {
        return false;
    }
    default.is_none_or(is_constant_literal)
}

/// Alterations that go through a table rebuild.
pub(super) fn rebuilds(alteration: &TableAlteration) -> bool {
    match alteration {
        TableAlteration::AddColumn(column) => !adds_in_place(column),
        TableAlteration::RenameColumn { .. } => false,
        _ => true,
    }
}

/// Default text as SQLite accepts it: literals bare, anything else in
/// parentheses.
pub(super) fn default_value(expression: &str) -> String {
    let expression = expression.trim();
    let upper = expression.to_ascii_uppercase();
    let is_bare = is_constant_literal(expression)
        || matches!(upper.as_str(), "CURRENT_TIME" | "CURRENT_DATE" | "CURRENT_TIMESTAMP")
        || is_wrapped(expression);
    if is_bare {
        expression.to_string()
    } else {
        format!("({})", expression)
    }
}

fn is_constant_literal(expression: &str) -> bool {
    let upper = expression.to_ascii_uppercase();
    if matches!(upper.as_str(), "NULL" | "TRUE" | "FALSE") {
        return true;
    }
    if expression.parse::<f64>().is_ok() {
        return true;
    }
    let quoted = expression
        .strip_prefix('\'')
        .or_else(|| {
            upper
                .starts_with("X'")
                .then(|| &expression[2..])
        })
        .and_then(|rest| rest.strip_suffix('\''));
    quoted.is_some_and(|inner| !inner.replace("''", "").contains('\''))
}

/// Whether the whole expression sits inside one pair of parentheses.
pub(super) fn is_wrapped(expression: &str) -> bool {
    if !expression.starts_with('(') || !expression.ends_with(')') {
        return false;
    }
    let mut depth = 0;
    let mut in_string = false;
    for (i, ch) in expression.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 && i + 1 < expression.len() {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
