//! Schema operations
//!
//! Drivers implement [`DialectSchema`]. The operation traits layered on it
//! (`TableMethods`, `ColumnMethods` and the rest) are what callers use; each
//! `*_if_not_exists` / `*_if_exists` call checks the catalog first and reports
//! whether it changed anything.

mod alteration;
mod capabilities;
mod columns;
mod constraints;
mod dialect_schema;
mod driver;
mod indexes;
mod schemas;
mod tables;
mod views;

pub use alteration::*;
pub use capabilities::*;
pub use columns::*;
pub use constraints::*;
pub use dialect_schema::*;
pub use driver::*;
pub use indexes::*;
pub use schemas::*;
pub use tables::*;
pub use views::*;
