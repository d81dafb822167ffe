//! Error types for kdb
//!
//! Every layer returns [`KdbResult`]. Absence of a value is modelled with
//! `Option`, and early termination of a scan with `ScanControl::Stop`, so the
//! error channel only carries genuine failures.
//!
//! The collection layer may wrap an error with the operation that produced it
//! (see [`KdbError::with_operation`]). Classification helpers such as
//! [`KdbError::is_conflict`] look through those annotations.

use crate::types::CollectionKind;
use std::io;
use thiserror::Error;

/// Result type alias for kdb operations
pub type KdbResult<T> = std::result::Result<T, KdbError>;

/// Error types for kdb
#[derive(Debug, Error)]
pub enum KdbError {
    /// A value the caller required does not exist
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing item
        what: String,
    },

    /// I/O error (data directory, lock file, checkpoint file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Engine-level failure
    #[error("Storage error: {message}")]
    Storage {
        /// Failure description
        message: String,
    },

    /// Persisted data failed validation
    #[error("Data corruption: {message}")]
    Corruption {
        /// What was found to be corrupt
        message: String,
    },

    /// Caller supplied an unusable argument
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Why the input was rejected
        message: String,
    },

    /// A key pattern failed to compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as supplied
        pattern: String,
        /// Compiler diagnostic
        reason: String,
    },

    /// Transaction lost an optimistic concurrency race
    #[error("Transaction aborted: {reason}")]
    TransactionAborted {
        /// Conflict summary
        reason: String,
    },

    /// Operation issued against a transaction that is no longer active
    #[error("Transaction not active: {state}")]
    TransactionNotActive {
        /// Observed transaction state
        state: String,
    },

    /// Operation issued through a handle whose collection was dropped
    #[error("{kind} '{name}' has been dropped")]
    CollectionDropped {
        /// Collection kind
        kind: CollectionKind,
        /// Collection name (lossy UTF-8)
        name: String,
    },

    /// An internal invariant or API precondition was broken
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Which invariant
        message: String,
    },

    /// The database is shutting down or closed
    #[error("Database is closed")]
    DatabaseClosed,

    /// Unexpected internal state
    #[error("Internal error: {message}")]
    Internal {
        /// Description
        message: String,
    },

    /// An error annotated with the collection operation that raised it
    #[error("{operation}: {source}")]
    Operation {
        /// Operation name, e.g. `hash.set`
        operation: &'static str,
        /// Underlying error
        #[source]
        source: Box<KdbError>,
    },
}

impl KdbError {
    /// Create a `NotFound` error
    pub fn not_found(what: impl Into<String>) -> Self {
        KdbError::NotFound { what: what.into() }
    }

    /// Create a `Storage` error
    pub fn storage(message: impl Into<String>) -> Self {
        KdbError::Storage {
            message: message.into(),
        }
    }

    /// Create a `Corruption` error
    pub fn corruption(message: impl Into<String>) -> Self {
        KdbError::Corruption {
            message: message.into(),
        }
    }

    /// Create an `InvalidInput` error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        KdbError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an `InvariantViolation` error
    pub fn invariant(message: impl Into<String>) -> Self {
        KdbError::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create an `Internal` error
    pub fn internal(message: impl Into<String>) -> Self {
        KdbError::Internal {
            message: message.into(),
        }
    }

    /// Create a `CollectionDropped` error
    pub fn collection_dropped(kind: CollectionKind, name: &[u8]) -> Self {
        KdbError::CollectionDropped {
            kind,
            name: String::from_utf8_lossy(name).into_owned(),
        }
    }

    /// Annotate with an operation name.
    ///
    /// An error that already carries an annotation is returned unchanged so
    /// nested calls do not stack labels.
    pub fn with_operation(self, operation: &'static str) -> Self {
        match self {
            KdbError::Operation { .. } => self,
            other => KdbError::Operation {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with operation annotations stripped
    pub fn root(&self) -> &KdbError {
        match self {
            KdbError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for optimistic concurrency conflicts (safe to retry)
    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), KdbError::TransactionAborted { .. })
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), KdbError::NotFound { .. })
    }

    /// True when the handle's collection was dropped
    pub fn is_collection_dropped(&self) -> bool {
        matches!(self.root(), KdbError::CollectionDropped { .. })
    }
}
