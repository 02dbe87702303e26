use super::ReferentialAction;
use crate::typemap::{HostType, HostTypeDescriptor, TypeOverride};
use crate::{Dialect, Result, SchemataError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Foreign key declared on a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnForeignKey {
    pub constraint_name: Option<String>,
    pub referenced_schema_name: Option<String>,
    pub referenced_table_name: String,
    pub referenced_column_name: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

/// A table column with its type, hints and column-level constraints.
///
/// Columns built with a `Nullable` host type start out nullable; every other
/// column starts `NOT NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub column_name: String,
    /// `None` for columns typed only through overrides, or introspected with a
    /// type no host type maps to
    pub host_type: Option<HostType>,
    /// Literal column type per dialect; wins over resolution
    pub dialect_types: BTreeMap<Dialect, String>,
    /// `{dialect:type,...}` or a bare literal for every dialect
    pub dialect_type_shorthand: Option<String>,
    pub length: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub is_unicode: Option<bool>,
    pub is_fixed_length: Option<bool>,
    pub is_auto_increment: bool,
    pub is_nullable: bool,
    pub default_expression: Option<String>,
    pub default_constraint_name: Option<String>,
    pub check_expression: Option<String>,
    pub check_constraint_name: Option<String>,
    pub is_primary_key: bool,
    pub primary_key_constraint_name: Option<String>,
    pub is_unique: bool,
    pub unique_constraint_name: Option<String>,
    pub is_indexed: bool,
    pub index_name: Option<String>,
    pub foreign_key: Option<ColumnForeignKey>,
}

impl Column {
    pub fn new(column_name: impl Into<String>, host_type: HostType) -> Self {
        Self {
            column_name: column_name.into(),
            is_nullable: host_type.is_nullable(),
            host_type: Some(host_type.into_non_nullable()),
            ..Default::default()
        }
    }

    /// A column with no host type; give it an override before use.
    pub fn untyped(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            ..Default::default()
        }
    }

    pub fn in_table(mut self, schema_name: Option<&str>, table_name: &str) -> Self {
        self.schema_name = schema_name.map(str::to_string);
        self.table_name = table_name.to_string();
        self
    }

    pub fn with_length(mut self, length: i32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: i32, scale: Option<i32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn unicode(mut self, unicode: bool) -> Self {
        self.is_unicode = Some(unicode);
        self
    }

    pub fn fixed_length(mut self, fixed: bool) -> Self {
        self.is_fixed_length = Some(fixed);
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.is_indexed = true;
        self
    }

    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default_expression = Some(expression.into());
        self
    }

    pub fn with_default_named(
        mut self,
        expression: impl Into<String>,
        constraint_name: impl Into<String>,
    ) -> Self {
        self.default_expression = Some(expression.into());
        self.default_constraint_name = Some(constraint_name.into());
        self
    }

    pub fn with_check(mut self, expression: impl Into<String>) -> Self {
        self.check_expression = Some(expression.into());
        self
    }

    pub fn with_check_named(
        mut self,
        expression: impl Into<String>,
        constraint_name: impl Into<String>,
    ) -> Self {
        self.check_expression = Some(expression.into());
        self.check_constraint_name = Some(constraint_name.into());
        self
    }

    pub fn references(
        mut self,
        referenced_table_name: impl Into<String>,
        referenced_column_name: impl Into<String>,
    ) -> Self {
        self.foreign_key = Some(ColumnForeignKey {
            constraint_name: None,
            referenced_schema_name: None,
            referenced_table_name: referenced_table_name.into(),
            referenced_column_name: referenced_column_name.into(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        });
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ColumnForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    pub fn with_type_override(mut self, dialect: Dialect, type_literal: impl Into<String>) -> Self {
        self.dialect_types.insert(dialect, type_literal.into());
        self
    }

    pub fn with_type_shorthand(mut self, shorthand: impl Into<String>) -> Self {
        self.dialect_type_shorthand = Some(shorthand.into());
        self
    }

    /// Explicit type for `dialect`: the map entry first, then the shorthand.
    pub fn type_override_for(&self, dialect: &Dialect) -> Result<Option<String>> {
        if let Some(literal) = self.dialect_types.get(dialect) {
            return Ok(Some(literal.clone()));
        }
        match &self.dialect_type_shorthand {
            Some(shorthand) => {
                let parsed = TypeOverride::parse(shorthand)?;
                Ok(parsed.for_dialect(dialect).map(str::to_string))
            }
            None => Ok(None),
        }
    }

    /// Host type plus hints, ready for forward resolution.
    pub fn host_type_descriptor(&self) -> Option<HostTypeDescriptor> {
        let host_type = self.host_type.clone()?;
        let mut descriptor = HostTypeDescriptor::new(host_type);
        descriptor.length = self.length;
        descriptor.precision = self.precision;
        descriptor.scale = self.scale;
        descriptor.is_unicode = self.is_unicode;
        descriptor.is_fixed_length = self.is_fixed_length;
        descriptor.is_auto_increment = self.is_auto_increment.then_some(true);
        Some(descriptor)
    }

    /// A column needs a host type or at least one override.
    pub fn validate(&self) -> Result<()> {
        if self.column_name.trim().is_empty() {
            return Err(SchemataError::Schema("column name must not be empty".into()));
        }
        if let Some(shorthand) = &self.dialect_type_shorthand {
            TypeOverride::parse(shorthand)?;
        }
        if self.host_type.is_none()
            && self.dialect_types.is_empty()
            && self.dialect_type_shorthand.is_none()
        {
            return Err(SchemataError::Schema(format!(
                "column '{}' has neither a host type nor a dialect type override",
                self.column_name
            )));
        }
        Ok(())
    }
}
