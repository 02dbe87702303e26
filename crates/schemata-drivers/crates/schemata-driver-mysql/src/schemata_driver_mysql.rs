//! MySQL schema driver
//!
//! Connection wrapper over mysql_async plus the [`MySqlSchema`]
//! implementation of the schema operations. MariaDB speaks the same protocol
//! and catalog and is served by the same driver.

mod connection;
mod schema;
mod types;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod schema_tests;

pub use connection::{MySqlCancelHandle, MySqlConnection, MySqlTransaction};
pub use schema::MySqlSchema;
pub use types::{MAX_VARCHAR_LENGTH, mysql_data_types, mysql_type_map};
