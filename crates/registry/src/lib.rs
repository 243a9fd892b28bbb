//! Resident registry domain module.
//!
//! Pure rules for registry records and identifier reuse (no IO, no storage).
//! Storage-backed allocation lives in `carestock-infra`.

pub mod allocation;
pub mod record;

pub use allocation::{Allocation, choose_identifier, sequential_after};
pub use record::{RecordPayload, RegistryRecord, Sex, UpdateOutcome};
