use std::collections::TryReserveError;

use thiserror::Error;

/// Primary error type for the yasf crates.
///
/// Only recoverable conditions live here. Caller bugs such as an ordinal past
/// the end of the row index, or using a model before its SQL is compiled,
/// panic at the call site instead.
#[derive(Error, Debug)]
pub enum YasfError {
    // === Resource Errors ===
    /// An allocation for SQL text, a key tuple, or a tree node failed.
    #[error("out of memory")]
    OutOfMemory,

    // === Editability Errors ===
    /// The object cannot be opened for editing.
    #[error("{table} is not editable: {reason}")]
    NotEditable { table: String, reason: String },

    /// Column is not part of the table being edited.
    #[error("no such column: {name}")]
    NoSuchColumn { name: String },

    /// A tuple or row had the wrong number of values.
    #[error("{what}: expected {expected} values, got {actual}")]
    ArityMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    // === Row Addressing Errors ===
    /// Visual row ordinal is past the end of the grid.
    #[error("row {ordinal} out of range ({len} rows)")]
    OrdinalOutOfRange { ordinal: usize, len: usize },

    /// The row behind a key no longer exists in the table.
    #[error("row vanished from {table}")]
    RowVanished { table: String },

    /// A statement touched a different number of rows than one.
    #[error("statement affected {actual} rows, expected {expected}")]
    UnexpectedRowCount { expected: usize, actual: usize },

    // === Executor Errors ===
    /// The query executor rejected or failed a statement.
    #[error("query failed: {detail} (sql: {sql})")]
    Query { sql: String, detail: String },

    /// A column value had an unexpected storage class.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    // === Configuration Errors ===
    /// Session configuration could not be parsed or is invalid.
    #[error("invalid configuration: {detail}")]
    Config { detail: String },

    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl YasfError {
    /// Whether the user can likely fix this without code changes.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotEditable { .. }
                | Self::NoSuchColumn { .. }
                | Self::ArityMismatch { .. }
                | Self::OrdinalOutOfRange { .. }
                | Self::RowVanished { .. }
                | Self::Query { .. }
                | Self::TypeMismatch { .. }
                | Self::Config { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotEditable { .. } => Some("Open a table instead of a view, index or trigger"),
            Self::RowVanished { .. } | Self::UnexpectedRowCount { .. } => {
                Some("The table changed underneath the editor; reload it")
            }
            Self::OutOfMemory => Some("Close other editing sessions and retry"),
            _ => None,
        }
    }

    /// Create a query error for `sql`.
    pub fn query(sql: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Query {
            sql: sql.into(),
            detail: detail.into(),
        }
    }

    /// Create a not-editable error.
    pub fn not_editable(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotEditable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<TryReserveError> for YasfError {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

/// Result type alias using `YasfError`.
pub type Result<T> = std::result::Result<T, YasfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = YasfError::not_editable("\"main\".\"v\"", "views are read-only");
        assert_eq!(
            err.to_string(),
            r#""main"."v" is not editable: views are read-only"#
        );
    }

    #[test]
    fn error_display_arity() {
        let err = YasfError::ArityMismatch {
            what: "primary key",
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "primary key: expected 2 values, got 1");
    }

    #[test]
    fn error_display_query() {
        let err = YasfError::query("delete from t;", "no such table: t");
        assert_eq!(
            err.to_string(),
            "query failed: no such table: t (sql: delete from t;)"
        );
    }

    #[test]
    fn try_reserve_maps_to_out_of_memory() {
        let mut buf: Vec<u8> = Vec::new();
        let err: YasfError = buf.try_reserve(usize::MAX).unwrap_err().into();
        assert!(matches!(err, YasfError::OutOfMemory));
    }

    #[test]
    fn user_recoverable() {
        assert!(YasfError::OrdinalOutOfRange { ordinal: 3, len: 3 }.is_user_recoverable());
        assert!(YasfError::config("bad").is_user_recoverable());
        assert!(!YasfError::OutOfMemory.is_user_recoverable());
        assert!(!YasfError::internal("bug").is_user_recoverable());
    }

    #[test]
    fn suggestions() {
        assert!(YasfError::not_editable("t", "x").suggestion().is_some());
        assert!(
            YasfError::UnexpectedRowCount {
                expected: 1,
                actual: 0
            }
            .suggestion()
            .is_some()
        );
        assert!(YasfError::internal("x").suggestion().is_none());
    }
}
