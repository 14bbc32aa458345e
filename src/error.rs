//! Error types for store, repository, and transaction operations.
//!
//! Every fallible operation in this crate returns [`StoreResult`]. The
//! variants deliberately stay coarse: callers branch on the kind of
//! failure, not on backend-specific detail, so swapping the document
//! store does not ripple through error handling.

use thiserror::Error;

use crate::model::TodoIdError;

/// Result alias used throughout the crate.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the document store and the layers built on it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document that was expected to exist could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An identifier failed syntactic validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The backing store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(String),

    /// A session or transaction control operation failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Input violated a shape-level constraint.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a store-level error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Creates a transaction-control error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true when the error indicates a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<TodoIdError> for StoreError {
    fn from(err: TodoIdError) -> Self {
        Self::InvalidIdentifier(err.to_string())
    }
}
