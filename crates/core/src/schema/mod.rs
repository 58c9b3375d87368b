//! Schema definitions.
//!
//! The engine compiles predicates against a `Table`; views use it to locate
//! the columns they materialize.

mod column;
mod table;

pub use column::Column;
pub use table::{Table, TableBuilder};
