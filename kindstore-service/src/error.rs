//! Error types for the record service and its store client.

use kindstore_codec::QueryError;
use thiserror::Error;

/// Result type for store client calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for record service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures reported by a [`Datastore`](crate::Datastore) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Strict insert hit an existing key.
    #[error("entity already exists: {0}")]
    AlreadyExists(String),

    /// Strict update addressed a key with no entity.
    #[error("no entity to update: {0}")]
    NoEntityToUpdate(String),

    /// An indexed property is larger than the store accepts.
    #[error("indexed property `{property}` is {size} bytes, limit is {limit}")]
    IndexSizeExceeded {
        property: String,
        size: usize,
        limit: usize,
    },

    /// A key had an ancestor element without an identifier.
    #[error("incomplete key: {0}")]
    IncompleteKey(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other store failure.
    #[error("store error: {0}")]
    Other(String),
}

/// Errors surfaced by the record service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The addressed record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A create targeted a key that already holds a record.
    #[error("record already exists: {0}")]
    Conflict(String),

    /// A property written as indexed is over the store's size limit.
    #[error("property `{property}` is too large to index ({size} bytes)")]
    IndexSizeExceeded { property: String, size: usize },

    /// The query used an operator or directive the store cannot evaluate.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(QueryError),

    /// The query was malformed: a reserved option had the wrong shape or
    /// the query was not an object.
    #[error("invalid query: {0}")]
    InvalidQuery(QueryError),

    /// Any other store failure, passed through unchanged.
    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    /// HTTP-equivalent status for transport layers.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::IndexSizeExceeded { .. } | Self::UnsupportedFilter(_) | Self::InvalidQuery(_) => {
                400
            }
            Self::Store(StoreError::Unavailable(_)) => 503,
            Self::Store(_) => 500,
        }
    }

    /// Returns true if this error means the record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(key) => Self::Conflict(key),
            StoreError::IndexSizeExceeded { property, size, .. } => {
                Self::IndexSizeExceeded { property, size }
            }
            other => Self::Store(other),
        }
    }
}

impl From<QueryError> for ServiceError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::UnsupportedOperator { .. } | QueryError::UnsupportedDirective(_) => {
                Self::UnsupportedFilter(err)
            }
            QueryError::InvalidOption { .. } | QueryError::NotAnObject => Self::InvalidQuery(err),
        }
    }
}
