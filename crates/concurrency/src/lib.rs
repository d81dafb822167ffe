//! Concurrency layer for kdb
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - TransactionContext: read/write set tracking with read-your-writes
//! - Snapshot isolation
//! - Conflict detection at commit time (first-committer-wins)
//! - TransactionManager: version allocation and atomic commit

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::TransactionManager;
pub use transaction::{
    ApplyResult, CommitError, PendingOperations, TransactionContext, TransactionStatus,
};
pub use validation::{validate_read_set, validate_transaction, ConflictType, ValidationResult};
