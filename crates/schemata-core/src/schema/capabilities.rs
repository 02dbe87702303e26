use serde::{Deserialize, Serialize};

/// Optional features a dialect's schema driver supports, queried at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCapabilities {
    /// Objects live in named schemas. When false, schema arguments are
    /// accepted and ignored, and introspection reports no schema.
    pub supports_schemas: bool,
    /// ASC/DESC is honoured inside primary key and unique constraints and
    /// unique indexes. When false, order is advisory and reads back ascending.
    pub supports_ordered_keys_in_constraints: bool,
    pub supports_check_constraints: bool,
    /// DDL inside a caller's transaction commits or rolls back with it.
    /// MySQL commits implicitly on every DDL statement.
    pub ddl_is_transactional: bool,
    /// Constraint changes and column drops rebuild the table (SQLite).
    pub rebuilds_tables_for_alterations: bool,
    /// Unique constraints and unique indexes are one catalog object, so
    /// index lookups also find unique constraints by name (MySQL).
    pub unique_constraints_are_indexes: bool,
}

impl Default for SchemaCapabilities {
    fn default() -> Self {
        Self {
            supports_schemas: false,
            supports_ordered_keys_in_constraints: false,
            supports_check_constraints: true,
            ddl_is_transactional: true,
            rebuilds_tables_for_alterations: false,
            unique_constraints_are_indexes: false,
        }
    }
}
