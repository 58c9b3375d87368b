//! Caller-facing errors and the translation from engine failures.
//!
//! Engine failures never reach callers as-is: every engine call made by a
//! view goes through [`translate`], [`translate_query`] or
//! [`translate_row_access`].

use grantview_core::EngineError;
use thiserror::Error;

/// Result type alias for permission view operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by permission views.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Index access at or beyond the current count.
    #[error("Index {index} is out of range (count {count})")]
    OutOfRange { index: usize, count: usize },
    /// Sort requested on an attribute outside the allow-list.
    #[error("Invalid sort key '{key}': permissions can only be sorted by path, userId or updatedAt")]
    InvalidSortKey { key: String },
    /// The operation is structurally inapplicable to permission results.
    #[error("{operation} is not supported for permission results")]
    UnsupportedOperation { operation: String },
    /// A predicate failed to compile.
    #[error("Invalid query: {message}")]
    Query { message: String },
    /// A permission change was rejected by the server.
    #[error("Permission error {code}: {message}")]
    Permission { code: i64, message: String },
    /// Any other engine failure.
    #[error("{message}")]
    Generic { message: String },
}

impl Error {
    pub fn invalid_sort_key(key: impl Into<String>) -> Self {
        Error::InvalidSortKey { key: key.into() }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Error::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Error::Generic {
            message: message.into(),
        }
    }

    /// Returns the numeric code carried by the failure, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            Error::Permission { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Translates an engine failure: permission-change failures keep their code
/// and message, everything else becomes [`Error::Generic`].
pub fn translate(err: EngineError) -> Error {
    match err {
        EngineError::PermissionChange { code, message } => Error::Permission { code, message },
        other => Error::Generic {
            message: other.to_string(),
        },
    }
}

/// Translates a failure from predicate compilation or evaluation.
pub fn translate_query(err: EngineError) -> Error {
    match err {
        EngineError::Parse { .. }
        | EngineError::ColumnNotFound { .. }
        | EngineError::TypeMismatch { .. } => Error::Query {
            message: err.to_string(),
        },
        other => translate(other),
    }
}

/// Translates a failure from indexed row access.
pub fn translate_row_access(err: EngineError) -> Error {
    match err {
        EngineError::IndexOutOfBounds { index, len } => Error::OutOfRange { index, count: len },
        other => translate(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantview_core::DataType;

    #[test]
    fn test_permission_change_keeps_code_and_message() {
        let err = translate(EngineError::permission_change(89, "Permission denied"));
        assert_eq!(
            err,
            Error::Permission {
                code: 89,
                message: "Permission denied".into()
            }
        );
        assert_eq!(err.code(), Some(89));
    }

    #[test]
    fn test_other_failures_are_generic() {
        let err = translate(EngineError::invalidated("realm was closed"));
        assert_eq!(err, Error::generic("Invalidated: realm was closed"));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_query_translation() {
        let err = translate_query(EngineError::column_not_found("permission", "owner"));
        assert_eq!(
            err,
            Error::Query {
                message: "Column owner not found in table permission".into()
            }
        );
        assert!(matches!(
            translate_query(EngineError::type_mismatch(DataType::Int32, DataType::String)),
            Error::Query { .. }
        ));
        assert!(matches!(
            translate_query(EngineError::parse("Expected a predicate", 0)),
            Error::Query { .. }
        ));
        assert!(matches!(
            translate_query(EngineError::invalidated("gone")),
            Error::Generic { .. }
        ));
    }

    #[test]
    fn test_row_access_translation() {
        assert_eq!(
            translate_row_access(EngineError::index_out_of_bounds(4, 2)),
            Error::OutOfRange { index: 4, count: 2 }
        );
        assert!(matches!(
            translate_row_access(EngineError::invalidated("gone")),
            Error::Generic { .. }
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::invalid_sort_key("accessLevel").to_string(),
            "Invalid sort key 'accessLevel': permissions can only be sorted by path, userId or updatedAt"
        );
        assert_eq!(
            Error::unsupported("sum").to_string(),
            "sum is not supported for permission results"
        );
    }
}
