//! SQLite schema driver
//!
//! Connection wrapper over rusqlite plus the [`SqliteSchema`] implementation of
//! the schema operations.

mod connection;
mod schema;
mod types;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod declaration_tests;
#[cfg(test)]
mod schema_tests;

pub use connection::{SqliteCancelHandle, SqliteConnection, SqliteTransaction};
pub use schema::{DeclaredConstraint, DeclaredKind, SqliteSchema, TableDeclaration, view_body};
pub use types::{affinity_host_type, sqlite_data_types, sqlite_type_map};
