//! Grantview Core - engine-level types shared by the query engine and the
//! permission views built on top of it.
//!
//! - `DataType`: Supported column types (Boolean, Int32, Int64, String, DateTime)
//! - `Value`: Runtime values held in a row cell
//! - `Row`: A row of values with a stable identifier and a version
//! - `schema`: Table and column definitions used as predicate compile context
//! - `EngineError`: Failures raised by the storage/query engine
//!
//! # Example
//!
//! ```rust
//! use grantview_core::{DataType, Value, Row};
//! use grantview_core::schema::TableBuilder;
//!
//! let table = TableBuilder::new("permission")
//!     .unwrap()
//!     .add_column("path", DataType::String)
//!     .unwrap()
//!     .add_column("userId", DataType::String)
//!     .unwrap()
//!     .build();
//!
//! let row = Row::new(1, vec![
//!     Value::String("/~/docs".into()),
//!     Value::String("alice".into()),
//! ]);
//!
//! assert_eq!(table.get_column_index("userId"), Some(1));
//! assert_eq!(row.get(1), Some(&Value::String("alice".into())));
//! ```

#![no_std]

extern crate alloc;

mod error;
pub mod pattern_match;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{EngineError, Result};
pub use row::{Row, RowId};
pub use types::DataType;
pub use value::Value;
