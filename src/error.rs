//! Error types for dialectdb.
//!
//! All errors are strongly typed using thiserror. Each category of the
//! failure taxonomy (registry, statement shape, execution, unsupported
//! features) has its own enum, and [`DbError`] wraps them so callers can
//! match on the category or on the specific condition.

use thiserror::Error;

/// Errors produced by the dialect registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("dialect {name} not registered")]
    NotRegistered {
        name: String,
    },

    #[error("dialect {name} expects a config of type {expected}")]
    ConfigMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("invalid config for dialect {name}: {message}")]
    InvalidConfig {
        name: String,
        message: String,
    },
}

/// Statement-shape errors raised while parsing SQL text or WHERE clauses.
#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("Invalid {statement} syntax: {sql}")]
    InvalidStatement {
        statement: &'static str,
        sql: String,
    },

    #[error("Unsupported SQL: {sql}")]
    UnsupportedSql {
        sql: String,
    },

    #[error("Unterminated string literal in: {input}")]
    UnterminatedString {
        input: String,
    },

    #[error("Unbalanced parentheses in: {input}")]
    UnbalancedParentheses {
        input: String,
    },

    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        token: String,
        position: usize,
    },

    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEnd {
        expected: &'static str,
    },

    #[error("Unknown condition operator: {operator}")]
    UnknownOperator {
        operator: String,
    },

    #[error("Malformed condition: {reason}")]
    MalformedCondition {
        reason: String,
    },
}

/// Errors raised while executing a compiled query against a backend.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Table {table} not found")]
    TableNotFound {
        table: String,
    },

    #[error("Table {table} already exists")]
    TableExists {
        table: String,
    },

    #[error("Column {column} not found in table {table}")]
    ColumnNotFound {
        table: String,
        column: String,
    },

    #[error("Column {column} already exists in table {table}")]
    ColumnExists {
        table: String,
        column: String,
    },

    #[error("Index {index} not found on table {table}")]
    IndexNotFound {
        table: String,
        index: String,
    },

    #[error("Index {index} already exists on table {table}")]
    IndexExists {
        table: String,
        index: String,
    },

    #[error("Collection {collection} not found")]
    CollectionNotFound {
        collection: String,
    },

    #[error("Bucket {bucket} not found")]
    BucketNotFound {
        bucket: String,
    },

    #[error("{context}: value is not an array")]
    NotAnArray {
        context: String,
    },

    #[error("Column {column} expects {expected}, got {value}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        value: String,
    },

    #[error("Constraint violation on table {table}: {message}")]
    ConstraintViolation {
        table: String,
        message: String,
    },

    #[error("Table {table} declares more than one auto-increment column")]
    MultipleAutoIncrement {
        table: String,
    },

    #[error("Statement names {columns} columns but supplies {values} values")]
    ColumnCountMismatch {
        columns: usize,
        values: usize,
    },

    #[error("Missing value for parameter #{index}")]
    MissingParameter {
        index: usize,
    },

    #[error("Dialect {dialect} is not connected")]
    NotConnected {
        dialect: &'static str,
    },
}

/// Top-level error type for dialectdb.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Unsupported: {feature}")]
    Unsupported {
        feature: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl DbError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an unsupported-feature error.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// Returns true if this is a registry error.
    #[must_use]
    pub const fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_))
    }

    /// Returns true if this is a statement-shape error.
    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an unsupported-feature error.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Returns true if the error reports a missing table, collection,
    /// bucket, column or index.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Execution(
                ExecutionError::TableNotFound { .. }
                    | ExecutionError::ColumnNotFound { .. }
                    | ExecutionError::IndexNotFound { .. }
                    | ExecutionError::CollectionNotFound { .. }
                    | ExecutionError::BucketNotFound { .. }
            )
        )
    }
}

/// Result type alias for dialectdb operations.
pub type DbResult<T> = Result<T, DbError>;

pub(crate) fn table_not_found(table: &str) -> DbError {
    ExecutionError::TableNotFound {
        table: table.to_string(),
    }
    .into()
}

pub(crate) fn lock_err(context: &'static str) -> DbError {
    DbError::internal(format!("poisoned lock: {context}"))
}

pub(crate) fn invalid_statement(statement: &'static str, sql: &str) -> DbError {
    SyntaxError::InvalidStatement {
        statement,
        sql: sql.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_message() {
        let err: DbError = RegistryError::NotRegistered {
            name: "oracle".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "dialect oracle not registered");
        assert!(err.is_registry());
    }

    #[test]
    fn test_invalid_statement_message() {
        let err = invalid_statement("INSERT", "INSERT INTO t VALUES");
        assert_eq!(err.to_string(), "Invalid INSERT syntax: INSERT INTO t VALUES");
        assert!(err.is_syntax());
    }

    #[test]
    fn test_unsupported_sql_message() {
        let err: DbError = SyntaxError::UnsupportedSql {
            sql: "VACUUM".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Unsupported SQL: VACUUM");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(table_not_found("users").is_not_found());

        let err: DbError = ExecutionError::BucketNotFound {
            bucket: "sessions".to_string(),
        }
        .into();
        assert!(err.is_not_found());
        assert!(err.is_execution());

        let err: DbError = ExecutionError::TableExists {
            table: "users".to_string(),
        }
        .into();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_an_array_message() {
        let err = ExecutionError::NotAnArray {
            context: "IN".to_string(),
        };
        assert!(err.to_string().contains("not an array"));
    }

    #[test]
    fn test_unsupported_and_internal() {
        let err = DbError::unsupported("default value of type list");
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("list"));

        let err = DbError::internal("poisoned lock");
        assert!(err.to_string().contains("poisoned lock"));
    }
}
