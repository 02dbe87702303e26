//! Schemata Core - provider-neutral schema model and type mapping
//!
//! This crate holds everything the dialect drivers share:
//!
//! - the schema model (`model`): tables, columns, constraints, indexes, views
//! - bidirectional type mapping (`typemap`) between host value types and
//!   dialect column types, with process-wide defaults and per-column overrides
//! - the schema-driver contract (`schema`): `DialectSchema` plus the per-kind
//!   operation traits built on it
//! - the SQL execution seam (`SqlExecutor`) drivers run their statements through

pub mod cancellation;
mod config;
mod connection;
mod dialect;
mod error;
pub mod model;
pub mod schema;
pub mod typemap;
mod types;

pub use config::*;
pub use connection::*;
pub use dialect::*;
pub use error::*;
pub use types::*;

pub use schema::{
    CheckConstraintMethods, ColumnMethods, DefaultConstraintMethods, DialectSchema,
    ForeignKeyConstraintMethods, IndexMethods, PrimaryKeyConstraintMethods, SchemaCapabilities,
    SchemaDriver, SchemaMethods, TableAlteration, TableMethods, UniqueConstraintMethods,
    ViewMethods,
};
pub use typemap::{HostType, HostTypeDescriptor, HostTyped, TypeMappingDefaults};

pub use tokio_util::sync::CancellationToken;
