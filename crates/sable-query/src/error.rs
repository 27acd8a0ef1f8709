//! Error types for query building and execution.

use thiserror::Error;

/// Errors raised by the query builder or the underlying connection.
#[derive(Debug, Error)]
pub enum QueryError {
    /// An operator outside the recognized comparison set was supplied.
    #[error("unrecognized operator `{0}`")]
    InvalidOperator(String),

    /// A NULL value was combined with an operator other than `=`/`!=`.
    #[error("operator `{0}` cannot be compared against NULL")]
    NullComparison(String),

    /// Opaque failure from the connection. Propagated unchanged; the query
    /// layer performs no retries and no reinterpretation.
    #[error("connection error: {0}")]
    Connection(Box<dyn std::error::Error + Send + Sync>),
}

impl QueryError {
    /// Wraps a driver error.
    pub fn connection<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection(Box::new(err))
    }
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
