//! Error types for the ORM layer.
//!
//! Errors are organised by where they originate so callers can tell a
//! malformed query apart from an I/O failure:
//!
//! - [`SchemaError`] - the entity cannot be mapped to a table
//! - [`QueryError`] - the query references unknown fields or has an unsupported shape
//! - [`ResultError`] - the result set does not fit the entity schema
//! - [`ConnectivityError`] - resolution, driver and timeout failures
//! - [`TransactionError`] - begin/commit/rollback failures
//! - [`ConfigError`] - invalid configuration
//!
//! Schema and query errors are deterministic; they are never retried and are
//! propagated to the caller unchanged.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::value::ValueType;

/// The primary error type for all ORM operations.
#[derive(Error, Debug)]
pub enum OrmError {
    /// Entity description errors
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Query shape errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Result set shape errors
    #[error(transparent)]
    Result(#[from] ResultError),

    /// Resolution, driver and timeout errors
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// Transaction errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OrmError {
    /// Returns true if this error was caused by the query itself rather than I/O.
    pub fn is_query_error(&self) -> bool {
        matches!(self, OrmError::Query(_) | OrmError::Schema(_))
    }

    /// Returns true if this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OrmError::Connectivity(ConnectivityError::Timeout { .. }))
    }
}

/// Errors raised while mapping an entity descriptor to a table model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The descriptor does not resolve to a record type.
    #[error("unsupported type: {type_name} is not a record")]
    UnsupportedType { type_name: String },

    /// Two fields map to the same column.
    #[error("duplicate column `{column}` in table `{table}`")]
    DuplicateColumn { table: String, column: String },

    /// Two fields share the same mapping key.
    #[error("duplicate field tag `{tag}` in table `{table}`")]
    DuplicateTag { table: String, tag: String },
}

/// Errors raised while compiling or routing a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A referenced field does not exist in the table model.
    #[error("illegal field: {field}")]
    IllegalField { field: String },

    /// HAVING was supplied without GROUP BY.
    #[error("missing group by: HAVING requires a GROUP BY clause")]
    MissingGroupBy,

    /// INSERT with no rows.
    #[error("insert zero row")]
    ZeroRows,

    /// A logical operator's operand is not a predicate.
    #[error("{side} operand is not a predicate")]
    NotAPredicate { side: &'static str },

    /// A comparison's left operand is not a column.
    #[error("left operand is not a column")]
    NotAColumn,

    /// A comparison's right operand is not a value.
    #[error("right operand is not a value")]
    NotAValue,

    /// Sharded statement built without a sharding algorithm.
    #[error("no sharding algorithm configured")]
    NoShardingAlgorithm,

    /// Routing produced an empty target set.
    #[error("predicate does not match any data source")]
    NoDataSource,
}

/// Errors raised while copying a result row into an entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResultError {
    /// The row has more columns than the schema.
    #[error("column count mismatch: schema has {expected} columns, row has {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    /// A row column is not part of the schema.
    #[error("column `{column}` from result set is not in schema")]
    ColumnNotInSchema { column: String },

    /// The query returned no rows where one was expected.
    #[error("query returned no rows")]
    NoRows,

    /// A value could not be converted to the field type.
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Errors converting a [`Value`](crate::value::Value) into a field type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The value has the wrong type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueType, found: String },

    /// The value does not fit the target integer width.
    #[error("value {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    /// NULL assigned to a non-nullable field.
    #[error("unexpected NULL for non-nullable {expected}")]
    UnexpectedNull { expected: ValueType },

    /// The entity has no field with this name or position.
    #[error("unknown field: {field}")]
    UnknownField { field: String },
}

/// Errors related to connectivity and the storage driver.
#[derive(Error, Debug)]
pub enum ConnectivityError {
    /// The connection string could not be parsed.
    #[error("invalid connection string `{dsn}`: {message}")]
    InvalidDsn { dsn: String, message: String },

    /// Domain resolution failed.
    #[error("failed to resolve `{domain}`: {message}")]
    Resolution { domain: String, message: String },

    /// Connecting to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Query or statement execution failed.
    #[error("query execution failed: {message}")]
    QueryFailed { message: String },

    /// The caller supplied deadline expired.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Internal driver error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// The transaction could not be started.
    #[error("failed to begin transaction: {message}")]
    BeginFailed { message: String },

    /// Commit failed.
    #[error("failed to commit transaction: {message}")]
    CommitFailed { message: String },

    /// The transaction has already been committed or rolled back.
    #[error("transaction no longer valid")]
    InvalidTransaction,

    /// The wrapped task panicked; the transaction was rolled back.
    #[error("transaction task panicked: {message}")]
    Panicked { message: String },

    /// Rolling back after a failure also failed.
    #[error("{cause}; rollback also failed: {rollback}")]
    RollbackFailed {
        cause: Box<OrmError>,
        rollback: Box<OrmError>,
    },
}

/// Errors in the configuration surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("invalid configuration for `{key}`: {message}")]
    Invalid { key: String, message: String },

    /// The configuration could not be read or parsed.
    #[error("failed to load configuration: {message}")]
    Load { message: String },

    /// More than one value is invalid.
    #[error("{} configuration problems: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for ORM operations.
pub type OrmResult<T> = Result<T, OrmError>;

/// Result type alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type alias for query compilation and routing.
pub type QueryResult<T> = Result<T, QueryError>;

impl From<ValueError> for OrmError {
    fn from(err: ValueError) -> Self {
        OrmError::Result(ResultError::Value(err))
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Load {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for OrmError {
    fn from(err: rusqlite::Error) -> Self {
        OrmError::Connectivity(ConnectivityError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for OrmError {
    fn from(err: r2d2::Error) -> Self {
        OrmError::Connectivity(ConnectivityError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display() {
        let err = QueryError::IllegalField {
            field: "Invalid".to_string(),
        };
        assert_eq!(err.to_string(), "illegal field: Invalid");
        assert_eq!(QueryError::ZeroRows.to_string(), "insert zero row");
    }

    #[test]
    fn test_query_errors_are_classified() {
        let err: OrmError = QueryError::MissingGroupBy.into();
        assert!(err.is_query_error());
        assert!(!err.is_timeout());

        let err: OrmError = ConnectivityError::Timeout { timeout_ms: 10 }.into();
        assert!(err.is_timeout());
        assert!(!err.is_query_error());
    }

    #[test]
    fn test_rollback_failure_keeps_cause() {
        let err = TransactionError::RollbackFailed {
            cause: Box::new(QueryError::ZeroRows.into()),
            rollback: Box::new(
                ConnectivityError::QueryFailed {
                    message: "connection reset".to_string(),
                }
                .into(),
            ),
        };
        let message = err.to_string();
        assert!(message.starts_with("insert zero row"));
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn test_value_error_converts_to_result_error() {
        let err: OrmError = ValueError::UnknownField {
            field: "age".to_string(),
        }
        .into();
        assert!(matches!(err, OrmError::Result(ResultError::Value(_))));
    }
}
