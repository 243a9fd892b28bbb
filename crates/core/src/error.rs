//! Domain error model.

use thiserror::Error;

use crate::id::ItemId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (bad input,
/// stock rules, missing entities). Storage concerns belong in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (missing required field, non-positive quantity, ...).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A movement kind outside RESTOCK / ISSUE / SERVICE.
    #[error("invalid movement kind: {0}")]
    InvalidMovementKind(String),

    /// A decrement would take the on-hand quantity below zero.
    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: i64,
        available: i64,
    },

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl DomainError {
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn invalid_kind(kind: impl Into<String>) -> Self {
        Self::InvalidMovementKind(kind.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
