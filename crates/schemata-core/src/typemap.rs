//! Bidirectional type mapping between host value types and dialect column types

mod defaults;
mod descriptor;
mod host;
mod map;
mod overrides;

pub use defaults::*;
pub use descriptor::*;
pub use host::*;
pub use map::*;
pub use overrides::*;
