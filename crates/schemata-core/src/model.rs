//! Provider-neutral schema model
//!
//! Plain data: tables own their columns, constraints and indexes, and nothing
//! points back up the tree. Validation here is structural only; whether a
//! dialect accepts a shape is decided by its driver.

mod column;
mod constraint;
mod index;
pub mod naming;
mod table;
mod view;

pub use column::*;
pub use constraint::*;
pub use index::*;
pub use table::*;
pub use view::*;

#[cfg(test)]
mod tests;
