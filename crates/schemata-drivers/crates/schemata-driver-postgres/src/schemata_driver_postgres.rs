//! PostgreSQL schema driver
//!
//! Connection wrapper over tokio-postgres plus the [`PostgresSchema`]
//! implementation of the schema operations.

mod connection;
mod schema;
mod tls;
mod types;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod schema_tests;
#[cfg(test)]
mod tls_tests;

pub use connection::{PostgresCancelHandle, PostgresConnection, PostgresTransaction};
pub use schema::PostgresSchema;
pub use tls::{SslMode, TlsSettings};
pub use types::{MAX_VARCHAR_LENGTH, postgres_data_types, postgres_type_map};
