//! Engine-level failures.
//!
//! These are raised by the storage/query engine and never cross into caller
//! code directly; the permissions crate translates them at its boundary.

use crate::types::DataType;
use alloc::string::String;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = core::result::Result<T, EngineError>;

/// Error types raised by engine operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Applying a permission change was rejected by the server.
    #[error("Permission change failed ({code}): {message}")]
    PermissionChange { code: i64, message: String },
    /// The handle or its transaction is no longer usable.
    #[error("Invalidated: {message}")]
    Invalidated { message: String },
    /// Row access past the end of a result set.
    #[error("Index {index} is out of bounds (size {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    /// Column not found.
    #[error("Column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },
    /// Predicate text could not be parsed.
    #[error("Parse error at {position}: {message}")]
    Parse { message: String, position: usize },
    /// Type mismatch error.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: DataType, got: DataType },
    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl EngineError {
    /// Creates a permission change error.
    pub fn permission_change(code: i64, message: impl Into<String>) -> Self {
        EngineError::PermissionChange {
            code,
            message: message.into(),
        }
    }

    /// Creates an invalidated error.
    pub fn invalidated(message: impl Into<String>) -> Self {
        EngineError::Invalidated {
            message: message.into(),
        }
    }

    /// Creates an out of bounds error.
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        EngineError::IndexOutOfBounds { index, len }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        EngineError::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        EngineError::Parse {
            message: message.into(),
            position,
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        EngineError::TypeMismatch { expected, got }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        EngineError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the numeric code carried by this error, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            EngineError::PermissionChange { code, .. } => Some(*code),
            _ => None,
        }
    }
}
