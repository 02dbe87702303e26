//! Schemata Drivers - schema drivers for the built-in dialects
//!
//! Each dialect lives in its own crate and is enabled by a cargo feature of the
//! same name. [`SchemaDriverRegistry`] picks the right one for a connection.

#[cfg(feature = "mssql")]
pub use schemata_driver_mssql as mssql;
#[cfg(feature = "mysql")]
pub use schemata_driver_mysql as mysql;
#[cfg(feature = "postgres")]
pub use schemata_driver_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use schemata_driver_sqlite as sqlite;

mod registry;

pub use registry::{DriverFactory, SchemaDriverRegistry};

/// Re-export commonly used types from schemata-core
pub use schemata_core::{
    CancellationToken, Connection, ConnectionConfig, Dialect, Result, SchemaDriver,
    SchemataError, SqlExecutor, TableAlteration, Transaction, Value,
};
