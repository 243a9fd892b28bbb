//! Identifier reuse rule for the resident registry.
//!
//! The rule, applied to the set of identifiers currently in use:
//!
//! 1. if `1` is free, use `1`;
//! 2. otherwise use `id + 1` for the smallest in-use `id` whose successor is
//!    free and not above the current maximum (an interior hole);
//! 3. otherwise append after the maximum.
//!
//! Steps 1 and 2 together pick the smallest free positive identifier whenever
//! it lies at or below the maximum. The storage engine must evaluate this
//! inside the same transaction as the insert it feeds.

use carestock_core::RecordId;

/// Where the next record should go.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// Reuse a free identifier (`1` or an interior hole).
    Reuse(RecordId),
    /// No hole exists; the store appends after the current maximum.
    Sequential,
}

impl Allocation {
    pub fn reused(self) -> Option<RecordId> {
        match self {
            Allocation::Reuse(id) => Some(id),
            Allocation::Sequential => None,
        }
    }
}

/// Apply the reuse rule to in-use identifiers given in ascending order.
///
/// Stops at the first hole, so the cost is proportional to the position of the
/// hole, not the size of the registry.
pub fn choose_identifier<I>(in_use_ascending: I) -> Allocation
where
    I: IntoIterator<Item = RecordId>,
{
    let mut ids = in_use_ascending.into_iter();

    let mut prev = match ids.next() {
        Some(first) if first == RecordId::FIRST => first,
        _ => return Allocation::Reuse(RecordId::FIRST),
    };

    for id in ids {
        debug_assert!(id > prev, "identifiers must be strictly ascending");
        let expected = prev.next();
        if id != expected {
            // expected < id <= max, so this is an interior hole.
            return Allocation::Reuse(expected);
        }
        prev = id;
    }

    Allocation::Sequential
}

/// The identifier a sequential insert receives.
pub fn sequential_after(max_in_use: Option<RecordId>) -> RecordId {
    max_in_use.map(RecordId::next).unwrap_or(RecordId::FIRST)
}
