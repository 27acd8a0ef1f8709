//! Error types for the ORM.

use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Builder or connection error from the query layer.
    #[error(transparent)]
    Query(#[from] sable_query::QueryError),

    /// `find_or_fail`/`first_or_fail` matched no row. Expected control flow,
    /// not a systemic failure; carries the entity name.
    #[error("no `{entity}` found for the given constraints")]
    NotFound { entity: String },

    /// A relation name was requested that the entity never defined.
    #[error("relation `{0}` is not defined")]
    RelationNotDefined(String),

    /// A pivot operation was requested on a relation that is not
    /// many-to-many.
    #[error("relation `{0}` is not a many-to-many relation")]
    NotManyToMany(String),

    /// Serialization failure from `to_json`.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
