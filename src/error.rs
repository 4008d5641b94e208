//! Error types for schemalink.
//!
//! This module defines all error types using `thiserror`. Each variant carries
//! enough context for a caller to render an actionable message or decide whether
//! to re-create a failed sync job.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Unsupported data source type: {engine}")]
    UnsupportedType { engine: String },

    #[error("Conflict: {message} (data source: {data_source_id})")]
    Conflict {
        message: String,
        data_source_id: String,
    },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Cannot {action} job {job_id} in state {from}")]
    InvalidTransition {
        job_id: String,
        from: String,
        action: String,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl MetaError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an unsupported engine type error.
    pub fn unsupported_type(engine: impl Into<String>) -> Self {
        Self::UnsupportedType {
            engine: engine.into(),
        }
    }

    /// Create a conflict error for a data source.
    pub fn conflict(message: impl Into<String>, data_source_id: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            data_source_id: data_source_id.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid state transition error.
    pub fn invalid_transition(
        job_id: impl Into<String>,
        from: impl std::fmt::Display,
        action: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            job_id: job_id.into(),
            from: from.to_string(),
            action: action.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(job_id: impl Into<String>) -> Self {
        Self::Cancelled {
            job_id: job_id.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::UnsupportedType { .. } => {
                Some("Supported engine types are postgresql, mysql and sqlite")
            }
            _ => None,
        }
    }

    /// Check if re-creating the job may succeed without changing its inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Convert sqlx errors to MetaError.
impl From<sqlx::Error> for MetaError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => MetaError::connection(
                msg.to_string(),
                "Check the connection parameters and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                MetaError::database(
                    db_err.message(),
                    code,
                    "Check that the catalog objects exist and are readable",
                )
            }
            sqlx::Error::RowNotFound => MetaError::database(
                "No rows returned",
                None,
                "Verify the schema and table names",
            ),
            sqlx::Error::PoolTimedOut => MetaError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                MetaError::connection("Connection pool is closed", "Reconnect to the data source")
            }
            sqlx::Error::Io(io_err) => MetaError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => MetaError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => MetaError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                MetaError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnDecode { index, source } => {
                MetaError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => MetaError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => MetaError::internal("Database worker crashed"),
            _ => MetaError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for metadata operations.
pub type MetaResult<T> = Result<T, MetaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MetaError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_conflict_display_names_data_source() {
        let err = MetaError::conflict("A sync job is already running", "warehouse");
        let msg = err.to_string();
        assert!(msg.contains("already running"));
        assert!(msg.contains("warehouse"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = MetaError::invalid_transition("job_1", "PENDING", "update progress of");
        assert_eq!(
            err.to_string(),
            "Cannot update progress of job job_1 in state PENDING"
        );
    }

    #[test]
    fn test_error_suggestion() {
        let err = MetaError::database("Syntax error", Some("42601".to_string()), "Check SQL");
        assert_eq!(err.suggestion(), Some("Check SQL"));
        assert!(MetaError::unsupported_type("oracle").suggestion().is_some());
        assert!(MetaError::validation("bad").suggestion().is_none());
    }

    #[test]
    fn test_error_retryable() {
        assert!(MetaError::timeout("get_tables", 30).is_retryable());
        assert!(MetaError::connection("err", "sugg").is_retryable());
        assert!(!MetaError::conflict("running", "ds").is_retryable());
        assert!(!MetaError::unsupported_type("db2").is_retryable());
    }

    #[test]
    fn test_not_found_display() {
        let err = MetaError::not_found("Sync job", "job_x");
        assert_eq!(err.to_string(), "Sync job not found: job_x");
    }
}
