//! SQL Server schema driver
//!
//! Connection wrapper over tiberius plus the [`MssqlSchema`] implementation of
//! the schema operations. Targets SQL Server 2016 and later.

mod connection;
mod schema;
mod types;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod schema_tests;

pub use connection::{MssqlCancelHandle, MssqlConnection, MssqlTransaction};
pub use schema::MssqlSchema;
pub use types::{MAX_BYTE_LENGTH, MAX_UNICODE_LENGTH, mssql_data_types, mssql_type_map};
