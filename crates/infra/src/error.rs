//! Typed outcomes returned to the collaborator.

use thiserror::Error;

use carestock_core::{DomainError, ItemId};

use crate::store::StorageError;

/// Failure of a core operation.
///
/// Every variant is returned only after the operation's transaction has been
/// rolled back, so no store is left half-written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Bad input; the caller can correct it and retry.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Movement kind outside RESTOCK / ISSUE / SERVICE.
    #[error("invalid movement kind: {0}")]
    InvalidMovementKind(String),

    /// The decrement would take stock below zero.
    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: i64,
        available: i64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent allocations kept claiming the same identifier.
    #[error("identifier allocation lost the race {attempts} time(s)")]
    AllocationRace { attempts: u32 },

    /// The storage engine failed; never retried automatically.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<DomainError> for OperationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::ConstraintViolation(msg) => OperationError::ConstraintViolation(msg),
            DomainError::InvalidMovementKind(kind) => OperationError::InvalidMovementKind(kind),
            DomainError::InsufficientStock {
                item_id,
                requested,
                available,
            } => OperationError::InsufficientStock {
                item_id,
                requested,
                available,
            },
            DomainError::NotFound(what) => OperationError::NotFound(what),
        }
    }
}

impl From<StorageError> for OperationError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Unavailable(msg) => OperationError::StorageUnavailable(msg),
            // Outside the allocator a key collision means the engine is in a
            // state we cannot reason about.
            StorageError::DuplicateKey(msg) => {
                OperationError::StorageUnavailable(format!("unexpected duplicate key: {msg}"))
            }
            StorageError::Corrupt(msg) => {
                OperationError::StorageUnavailable(format!("corrupt row: {msg}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_category() {
        let err: OperationError = DomainError::invalid_kind("TRANSFER").into();
        assert_eq!(err, OperationError::InvalidMovementKind("TRANSFER".to_string()));

        let err: OperationError = DomainError::constraint("quantity").into();
        assert!(matches!(err, OperationError::ConstraintViolation(_)));
    }

    #[test]
    fn every_storage_error_is_unavailable() {
        for err in [
            StorageError::Unavailable("down".into()),
            StorageError::DuplicateKey("k".into()),
            StorageError::Corrupt("row".into()),
        ] {
            assert!(matches!(OperationError::from(err), OperationError::StorageUnavailable(_)));
        }
    }
}
