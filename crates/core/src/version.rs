//! Optimistic concurrency expectations for mutable records.

use serde::{Deserialize, Serialize};

/// Optimistic concurrency expectation for an in-place update.
///
/// Records carry a version that starts at 1 and increases by one per update.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Skip version checking (last writer wins).
    Any,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
