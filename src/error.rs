//! Error types for idweld.
//!
//! All errors are strongly typed using thiserror. The taxonomy mirrors the
//! request lifecycle: validation failures stop a request before the engine
//! runs; execution failures abort the whole reconciliation transaction so a
//! cluster is never left half-merged.

use thiserror::Error;

use crate::contact::ContactId;
use crate::storage::StorageError;

/// Validation errors raised before the engine touches the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Both email and phone number were absent or blank.
    #[error("at least one of email or phone number is required")]
    MissingIdentifier,
}

/// Execution errors raised while reconciling against the store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A matched contact's linked primary vanished between read and write
    /// (concurrent deletion). Retryable.
    #[error("primary contact not found: {id}")]
    PrimaryNotFound {
        /// The id the dangling link pointed at.
        id: ContactId,
    },

    /// The store failed; the reconciliation transaction was rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Top-level error type for idweld operations.
#[derive(Debug, Error)]
pub enum IdweldError {
    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Reconciliation failed mid-flight.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl IdweldError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Only a vanished primary qualifies: it signals a concurrent mutation
    /// that a fresh snapshot will no longer observe. Validation errors never
    /// change on retry and storage failures are a service problem.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::PrimaryNotFound { .. })
        )
    }
}

impl From<StorageError> for IdweldError {
    fn from(err: StorageError) -> Self {
        Self::Execution(ExecutionError::Storage(err))
    }
}

/// Result type alias for idweld operations.
pub type IdweldResult<T> = Result<T, IdweldError>;
