//! Transaction validation for OCC
//!
//! Rules:
//! - First-committer-wins based on the READ set, not the write set
//! - Blind writes (write without read) do NOT conflict
//! - Read-only transactions always commit
//! - Write skew is allowed

use std::collections::HashMap;

use kdb_core::{KdbError, KdbResult, Storage};

use crate::transaction::TransactionContext;

/// Types of conflicts that can occur during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// A key read by the transaction changed before commit
    ReadWriteConflict {
        /// The conflicting key
        key: Vec<u8>,
        /// Version observed at read time (0 = absent)
        read_version: u64,
        /// Version in storage at validation time (0 = absent)
        current_version: u64,
    },
}

/// Result of validating a transaction
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts found
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// A result with no conflicts
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// A result holding a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// True when no conflicts were found
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Check every read-set entry against the store's current version
pub fn validate_read_set<S: Storage + ?Sized>(
    read_set: &HashMap<Vec<u8>, u64>,
    store: &S,
) -> KdbResult<ValidationResult> {
    let mut result = ValidationResult::ok();

    for (key, read_version) in read_set {
        let current_version = match store.get(key) {
            Ok(Some(vv)) => vv.version,
            Ok(None) => 0,
            Err(e) => {
                // Never commit on a failed check
                return Err(KdbError::internal(format!(
                    "Storage error during read-set validation for key {:?}: {}",
                    key, e
                )));
            }
        };

        if current_version != *read_version {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                key: key.clone(),
                read_version: *read_version,
                current_version,
            });
        }
    }

    Ok(result)
}

/// Validate a whole transaction
///
/// Read-only transactions always validate: they observed a consistent snapshot.
pub fn validate_transaction<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> KdbResult<ValidationResult> {
    if txn.is_read_only() {
        return Ok(ValidationResult::ok());
    }
    let mut result = ValidationResult::ok();
    result.merge(validate_read_set(&txn.read_set, store)?);
    Ok(result)
}
