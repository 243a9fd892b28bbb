//! Strongly-typed identifiers used across the domain.
//!
//! All identifiers are positive integers: they are allocation keys and
//! foreign references in the persisted tables, so `0` and negatives are
//! rejected at construction.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a registry (resident) record. This is the allocation key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RecordId(i64);

/// Identifier of a stocked item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ItemId(i64);

/// Identifier of an appended movement record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct MovementId(i64);

/// Identifier of the staff member performing an action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ActorId(i64);

/// Identifier of the resident receiving issued or consumed goods.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SubjectId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Validate and wrap a raw identifier.
            pub fn new(value: i64) -> Result<Self, DomainError> {
                if value <= 0 {
                    return Err(DomainError::constraint(format!(
                        "{} must be positive (got {})",
                        $name, value
                    )));
                }
                Ok(Self(value))
            }

            /// Wrap a value read back from storage, where the key constraint
            /// already guarantees positivity.
            pub const fn from_raw(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl TryFrom<i64> for $t {
            type Error = DomainError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::constraint(format!("{}: {}", $name, e)))?;
                Self::new(raw)
            }
        }
    };
}

impl_int_newtype!(RecordId, "RecordId");
impl_int_newtype!(ItemId, "ItemId");
impl_int_newtype!(MovementId, "MovementId");
impl_int_newtype!(ActorId, "ActorId");
impl_int_newtype!(SubjectId, "SubjectId");

impl RecordId {
    /// The first identifier handed out by the allocator.
    pub const FIRST: RecordId = RecordId(1);

    /// The identifier directly above this one.
    pub const fn next(self) -> RecordId {
        RecordId(self.0 + 1)
    }
}

/// Movements for a resident name them by their registry identifier.
impl From<RecordId> for SubjectId {
    fn from(value: RecordId) -> Self {
        SubjectId(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_ids_are_rejected() {
        assert!(RecordId::new(0).is_err());
        assert!(ItemId::new(-3).is_err());
        assert_eq!(ActorId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn parses_from_str() {
        let id: SubjectId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);

        match "abc".parse::<MovementId>() {
            Err(DomainError::ConstraintViolation(msg)) => assert!(msg.contains("MovementId")),
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn serde_is_transparent_and_validating() {
        let json = serde_json::to_string(&RecordId::new(5).unwrap()).unwrap();
        assert_eq!(json, "5");

        let back: RecordId = serde_json::from_str("5").unwrap();
        assert_eq!(back, RecordId::from_raw(5));

        assert!(serde_json::from_str::<ItemId>("0").is_err());
    }

    #[test]
    fn next_steps_by_one() {
        assert_eq!(RecordId::FIRST.next().get(), 2);
    }
}
