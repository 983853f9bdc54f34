//! Error types for query parsing.

use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while reading a filter query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A field filter used an operator the store cannot evaluate.
    #[error("unsupported operator `{operator}` on field `{field}`")]
    UnsupportedOperator { field: String, operator: String },

    /// A top-level `$` directive the store cannot evaluate (`$or`, `$limit`, ...).
    #[error("unsupported query directive `{0}`")]
    UnsupportedDirective(String),

    /// A reserved option carried a value of the wrong shape.
    #[error("invalid value for query option `{option}`: {reason}")]
    InvalidOption { option: String, reason: String },

    /// The query was not a JSON object.
    #[error("query must be an object")]
    NotAnObject,
}
