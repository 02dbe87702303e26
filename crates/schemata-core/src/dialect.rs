//! SQL dialect identity and data type metadata
//!
//! Drivers describe every type their dialect supports with a [`DataTypeInfo`]
//! table. The table is built once per driver, never mutated afterwards, and is the
//! surface reverse type resolution and value marshalling read from.

use crate::typemap::HostType;
use crate::{Result, SchemataError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// The dialects a schema driver can speak.
///
/// `Other` is the extension slot for drivers registered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Dialect {
    SqlServer,
    MySql,
    PostgreSql,
    Sqlite,
    Other(String),
}

impl Dialect {
    /// The four built-in dialects.
    pub const BUILT_IN: [Dialect; 4] = [
        Dialect::SqlServer,
        Dialect::MySql,
        Dialect::PostgreSql,
        Dialect::Sqlite,
    ];

    /// Canonical identifier, as used in override shorthand and `dialect_id()`.
    pub fn id(&self) -> &str {
        match self {
            Dialect::SqlServer => "sqlserver",
            Dialect::MySql => "mysql",
            Dialect::PostgreSql => "postgresql",
            Dialect::Sqlite => "sqlite",
            Dialect::Other(id) => id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Dialect::SqlServer => "SQL Server",
            Dialect::MySql => "MySQL",
            Dialect::PostgreSql => "PostgreSQL",
            Dialect::Sqlite => "SQLite",
            Dialect::Other(id) => id,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Dialect {
    type Err = SchemataError;

    /// Accepts the common aliases; anything else non-empty becomes `Other`.
    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim().to_ascii_lowercase();
        Ok(match id.as_str() {
            "sqlserver" | "mssql" | "sql_server" | "tsql" => Dialect::SqlServer,
            "mysql" | "mariadb" => Dialect::MySql,
            "postgresql" | "postgres" | "pg" | "npgsql" => Dialect::PostgreSql,
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            "" => {
                return Err(SchemataError::Configuration(
                    "dialect identifier must not be empty".into(),
                ));
            }
            _ => Dialect::Other(id),
        })
    }
}

impl From<Dialect> for String {
    fn from(value: Dialect) -> Self {
        value.id().to_string()
    }
}

impl TryFrom<String> for Dialect {
    type Error = SchemataError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Categories of SQL data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeCategory {
    /// Integer types (INTEGER, BIGINT, etc.)
    Integer,
    /// Floating point (REAL, DOUBLE, etc.)
    Float,
    /// Fixed precision (DECIMAL, NUMERIC)
    Decimal,
    /// Character/String (VARCHAR, TEXT, etc.)
    String,
    /// Binary data (BLOB, BYTEA, etc.)
    Binary,
    Boolean,
    Date,
    Time,
    DateTime,
    Interval,
    Json,
    Array,
    Uuid,
    /// Network types (INET, CIDR, etc.)
    Network,
    Geometry,
    Other,
}

/// Coarse grouping used when comparing types across dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFamily {
    Integer,
    Real,
    Text,
    Binary,
    DateTime,
    Boolean,
    Other,
}

impl DataTypeCategory {
    pub fn family(self) -> TypeFamily {
        match self {
            DataTypeCategory::Integer => TypeFamily::Integer,
            DataTypeCategory::Float | DataTypeCategory::Decimal => TypeFamily::Real,
            DataTypeCategory::String
            | DataTypeCategory::Json
            | DataTypeCategory::Uuid
            | DataTypeCategory::Network => TypeFamily::Text,
            DataTypeCategory::Binary => TypeFamily::Binary,
            DataTypeCategory::Boolean => TypeFamily::Boolean,
            DataTypeCategory::Date
            | DataTypeCategory::Time
            | DataTypeCategory::DateTime
            | DataTypeCategory::Interval => TypeFamily::DateTime,
            DataTypeCategory::Array | DataTypeCategory::Geometry | DataTypeCategory::Other => {
                TypeFamily::Other
            }
        }
    }

    /// Host type a value of this category reads back as when the type entry
    /// names no preference.
    pub fn default_host_type(self) -> HostType {
        match self {
            DataTypeCategory::Integer => HostType::I32,
            DataTypeCategory::Float => HostType::F64,
            DataTypeCategory::Decimal => HostType::Decimal,
            DataTypeCategory::String | DataTypeCategory::Network => HostType::String,
            DataTypeCategory::Binary | DataTypeCategory::Geometry => HostType::Bytes,
            DataTypeCategory::Boolean => HostType::Bool,
            DataTypeCategory::Date => HostType::Date,
            DataTypeCategory::Time => HostType::Time,
            DataTypeCategory::DateTime => HostType::DateTime,
            DataTypeCategory::Interval => HostType::Duration,
            DataTypeCategory::Json => HostType::Json,
            DataTypeCategory::Array => HostType::List(Box::new(HostType::String)),
            DataTypeCategory::Uuid => HostType::Uuid,
            DataTypeCategory::Other => HostType::String,
        }
    }
}

/// Information about a SQL data type
#[derive(Debug, Clone)]
pub struct DataTypeInfo {
    /// Type name as used in DDL (e.g., "varchar", "integer")
    pub name: Cow<'static, str>,
    /// Aliases (e.g., "int" for "integer")
    pub aliases: Vec<Cow<'static, str>>,
    pub category: DataTypeCategory,
    pub accepts_length: bool,
    pub accepts_precision: bool,
    pub accepts_scale: bool,
    pub default_length: Option<u32>,
    pub max_length: Option<u64>,
    pub default_precision: Option<u8>,
    pub max_precision: Option<u8>,
    pub default_scale: Option<u8>,
    pub max_scale: Option<u8>,
    /// Stores wide (UTF-16/national) characters
    pub is_unicode: bool,
    /// Pads to its declared length
    pub is_fixed_length: bool,
    /// Shown first in type pickers
    pub is_common: bool,
    /// Host type this column type reads back as; overrides the category default
    pub host_type: Option<HostType>,
    pub description: Option<Cow<'static, str>>,
}

impl DataTypeInfo {
    pub const fn new(name: &'static str, category: DataTypeCategory) -> Self {
        Self {
            name: Cow::Borrowed(name),
            aliases: Vec::new(),
            category,
            accepts_length: false,
            accepts_precision: false,
            accepts_scale: false,
            default_length: None,
            max_length: None,
            default_precision: None,
            max_precision: None,
            default_scale: None,
            max_scale: None,
            is_unicode: false,
            is_fixed_length: false,
            is_common: false,
            host_type: None,
            description: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&'static str]) -> Self {
        self.aliases
            .extend(aliases.iter().map(|alias| Cow::Borrowed(*alias)));
        self
    }

    pub fn with_length(mut self, default: Option<u32>, max: Option<u64>) -> Self {
        self.accepts_length = true;
        self.default_length = default;
        self.max_length = max;
        self
    }

    pub fn with_precision(mut self, default: Option<u8>, max: Option<u8>) -> Self {
        self.accepts_precision = true;
        self.default_precision = default;
        self.max_precision = max;
        self
    }

    pub fn with_scale(mut self, default: Option<u8>, max: Option<u8>) -> Self {
        self.accepts_scale = true;
        self.default_scale = default;
        self.max_scale = max;
        self
    }

    pub fn unicode(mut self) -> Self {
        self.is_unicode = true;
        self
    }

    pub fn fixed_length(mut self) -> Self {
        self.is_fixed_length = true;
        self
    }

    pub fn common(mut self) -> Self {
        self.is_common = true;
        self
    }

    pub fn maps_to(mut self, host_type: HostType) -> Self {
        self.host_type = Some(host_type);
        self
    }

    pub fn with_desc(mut self, description: &'static str) -> Self {
        self.description = Some(Cow::Borrowed(description));
        self
    }

    /// Whether `name` (lower-cased) is this type's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    }

    /// Host type this column type reads back as.
    pub fn preferred_host_type(&self) -> HostType {
        self.host_type
            .clone()
            .unwrap_or_else(|| self.category.default_host_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_aliases() {
        assert_eq!("MSSQL".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert_eq!("mariadb".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("pg".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!("sqlite3".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!(
            "DuckDB".parse::<Dialect>().unwrap(),
            Dialect::Other("duckdb".into())
        );
        assert!(" ".parse::<Dialect>().is_err());
    }

    #[test]
    fn dialect_serializes_as_its_id() {
        let json = serde_json::to_string(&Dialect::PostgreSql).unwrap();
        assert_eq!(json, "\"postgresql\"");
        let back: Dialect = serde_json::from_str("\"mssql\"").unwrap();
        assert_eq!(back, Dialect::SqlServer);
    }

    #[test]
    fn data_type_info_answers_to_aliases() {
        let info = DataTypeInfo::new("integer", DataTypeCategory::Integer)
            .with_aliases(&["int", "int4"])
            .maps_to(HostType::I32);
        assert!(info.answers_to("INT4"));
        assert!(!info.answers_to("int8"));
        assert_eq!(info.preferred_host_type(), HostType::I32);
    }

    #[test]
    fn categories_fold_into_families() {
        assert_eq!(DataTypeCategory::Decimal.family(), TypeFamily::Real);
        assert_eq!(DataTypeCategory::Uuid.family(), TypeFamily::Text);
        assert_eq!(DataTypeCategory::Interval.family(), TypeFamily::DateTime);
    }
}
