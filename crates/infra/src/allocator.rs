//! Gap-filling identifier allocation for the resident registry.
//!
//! ## Allocation Flow
//!
//! ```text
//! payload
//!   ↓
//! 1. Validate (no storage access on bad input)
//!   ↓
//! 2. Begin transaction
//!   ↓
//! 3. Choose identifier (1, else smallest interior hole, else sequential)
//!   ↓
//! 4. Insert with that identifier
//!   ↓
//! 5. Commit; on duplicate key roll back and start again from 2
//! ```
//!
//! Steps 3 and 4 share one transaction, so the chosen identifier cannot be
//! claimed in between on an engine that serialises transactions. The retry
//! covers engines that only detect the collision at insert time.

use tracing::{debug, info, warn};

use carestock_core::{ExpectedVersion, RecordId};
use carestock_registry::{RecordPayload, RegistryRecord, UpdateOutcome};

use crate::config::CoreConfig;
use crate::error::OperationError;
use crate::store::{Storage, StorageError, StorageTx};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Full decide-then-insert attempts before `AllocationRace` surfaces.
    pub max_attempts: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl From<&CoreConfig> for AllocatorConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            max_attempts: config.allocation_attempts,
        }
    }
}

/// Outcome of one decide-then-insert attempt.
#[derive(Debug)]
enum AttemptError {
    /// Another writer took the candidate; the attempt was rolled back.
    Lost(String),
    Failed(OperationError),
}

impl From<StorageError> for AttemptError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::DuplicateKey(detail) => AttemptError::Lost(detail),
            other => AttemptError::Failed(other.into()),
        }
    }
}

/// Registry front door: allocation plus the rest of the record lifecycle.
#[derive(Debug)]
pub struct IdentifierAllocator<S> {
    storage: S,
    config: AllocatorConfig,
}

impl<S> IdentifierAllocator<S>
where
    S: Storage,
{
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, AllocatorConfig::default())
    }

    pub fn with_config(storage: S, config: AllocatorConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Insert a record under the lowest reusable identifier.
    pub fn allocate_and_insert(
        &self,
        payload: RecordPayload,
    ) -> Result<RegistryRecord, OperationError> {
        payload.validate()?;

        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self
                .storage
                .transaction(|tx| Self::decide_and_insert(tx, &payload))
            {
                Ok(record) => {
                    info!(record_id = %record.id, attempt, "registry record allocated");
                    return Ok(record);
                }
                Err(AttemptError::Lost(detail)) => {
                    warn!(
                        attempt,
                        attempts,
                        %detail,
                        "identifier claimed concurrently; rolled back"
                    );
                }
                Err(AttemptError::Failed(err)) => return Err(err),
            }
        }

        Err(OperationError::AllocationRace { attempts })
    }

    fn decide_and_insert(
        tx: &mut dyn StorageTx,
        payload: &RecordPayload,
    ) -> Result<RegistryRecord, AttemptError> {
        let allocation = tx.choose_record_id()?;
        debug!(?allocation, "identifier chosen");
        Ok(tx.insert_record(allocation.reused(), payload)?)
    }

    /// Remove a record. Its identifier becomes a hole; nothing is renumbered.
    pub fn delete_record(&self, id: RecordId) -> Result<bool, OperationError> {
        let deleted = self
            .storage
            .transaction(|tx| tx.delete_record(id).map_err(OperationError::from))?;
        if deleted {
            info!(record_id = %id, "registry record deleted");
        }
        Ok(deleted)
    }

    /// Replace a record's payload if it is still at the expected version.
    pub fn update_record(
        &self,
        id: RecordId,
        payload: RecordPayload,
        expected: ExpectedVersion,
    ) -> Result<UpdateOutcome, OperationError> {
        payload.validate()?;

        let outcome = self.storage.transaction(|tx| {
            tx.update_record(id, &payload, expected)
                .map_err(OperationError::from)
        })?;

        match &outcome {
            UpdateOutcome::Updated(record) => {
                info!(record_id = %id, version = record.version, "registry record updated")
            }
            UpdateOutcome::VersionConflict { actual } => {
                warn!(
                    record_id = %id,
                    ?expected,
                    actual,
                    "registry update lost to a concurrent change"
                )
            }
            UpdateOutcome::NotFound => debug!(record_id = %id, "registry update target missing"),
        }
        Ok(outcome)
    }

    pub fn record(&self, id: RecordId) -> Result<Option<RegistryRecord>, OperationError> {
        self.storage.transaction(|tx| tx.record(id).map_err(OperationError::from))
    }

    /// All records, ascending by identifier.
    pub fn records(&self) -> Result<Vec<RegistryRecord>, OperationError> {
        self.storage.transaction(|tx| tx.records().map_err(OperationError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultPoint, FaultyStorage, InMemoryStorage, InjectedFault};

    fn allocator() -> IdentifierAllocator<InMemoryStorage> {
        IdentifierAllocator::new(InMemoryStorage::new())
    }

    fn payload(name: &str) -> RecordPayload {
        RecordPayload::new(name, "Resident")
    }

    fn rid(v: i64) -> RecordId {
        RecordId::new(v).unwrap()
    }

    fn seed(allocator: &IdentifierAllocator<impl Storage>, n: usize) {
        for i in 0..n {
            allocator.allocate_and_insert(payload(&format!("r{i}"))).unwrap();
        }
    }

    #[test]
    fn deleted_identifier_is_reused() {
        let allocator = allocator();
        seed(&allocator, 3);

        assert!(allocator.delete_record(rid(2)).unwrap());
        let record = allocator.allocate_and_insert(payload("new")).unwrap();
        assert_eq!(record.id, rid(2));
    }

    #[test]
    fn contiguous_registry_grows_sequentially() {
        let allocator = allocator();
        seed(&allocator, 3);

        let record = allocator.allocate_and_insert(payload("new")).unwrap();
        assert_eq!(record.id, rid(4));
    }

    #[test]
    fn deleting_the_top_does_not_leave_a_hole() {
        let allocator = allocator();
        seed(&allocator, 3);
        allocator.delete_record(rid(3)).unwrap();

        let record = allocator.allocate_and_insert(payload("new")).unwrap();
        assert_eq!(record.id, rid(3));
    }

    #[test]
    fn deleting_never_renumbers() {
        let allocator = allocator();
        seed(&allocator, 4);
        allocator.delete_record(rid(1)).unwrap();

        let ids: Vec<i64> = allocator
            .records()
            .unwrap()
            .iter()
            .map(|r| r.id.get())
            .collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn delete_of_missing_record_reports_false() {
        assert!(!allocator().delete_record(rid(9)).unwrap());
    }

    #[test]
    fn invalid_payload_is_rejected_without_consuming_an_id() {
        let allocator = allocator();
        let err = allocator
            .allocate_and_insert(RecordPayload::new("", "Resident"))
            .unwrap_err();
        assert!(matches!(err, OperationError::ConstraintViolation(_)));

        let record = allocator.allocate_and_insert(payload("ok")).unwrap();
        assert_eq!(record.id, rid(1));
    }

    #[test]
    fn lost_race_is_retried_once() {
        let store = FaultyStorage::new(InMemoryStorage::new());
        store
            .plan()
            .arm(FaultPoint::InsertRecord, InjectedFault::DuplicateKey);
        let allocator = IdentifierAllocator::new(store);

        let record = allocator.allocate_and_insert(payload("a")).unwrap();
        assert_eq!(record.id, rid(1));
        assert_eq!(allocator.storage().plan().pending(FaultPoint::InsertRecord), 0);
    }

    #[test]
    fn persistent_race_surfaces_after_all_attempts() {
        let store = FaultyStorage::new(InMemoryStorage::new());
        store
            .plan()
            .arm_times(FaultPoint::InsertRecord, InjectedFault::DuplicateKey, 2);
        let allocator = IdentifierAllocator::new(store);

        let err = allocator.allocate_and_insert(payload("a")).unwrap_err();
        assert_eq!(err, OperationError::AllocationRace { attempts: 2 });
        assert!(allocator.records().unwrap().is_empty());
    }

    #[test]
    fn storage_failure_is_not_retried() {
        let store = FaultyStorage::new(InMemoryStorage::new());
        store
            .plan()
            .arm_times(FaultPoint::InsertRecord, InjectedFault::Unavailable, 1);
        let allocator = IdentifierAllocator::new(store);

        let err = allocator.allocate_and_insert(payload("a")).unwrap_err();
        assert!(matches!(err, OperationError::StorageUnavailable(_)));
        assert!(allocator.records().unwrap().is_empty());
    }

    #[test]
    fn commit_failure_leaves_no_record_behind() {
        let store = FaultyStorage::new(InMemoryStorage::new());
        let allocator = IdentifierAllocator::new(store);
        seed(&allocator, 2);
        allocator.storage().plan().arm(FaultPoint::Commit, InjectedFault::Unavailable);

        assert!(allocator.allocate_and_insert(payload("x")).is_err());
        let record = allocator.allocate_and_insert(payload("y")).unwrap();
        assert_eq!(record.id, rid(3));
    }

    #[test]
    fn update_reports_version_conflicts() {
        let allocator = allocator();
        let record = allocator.allocate_and_insert(payload("a")).unwrap();

        let outcome = allocator
            .update_record(record.id, payload("b"), ExpectedVersion::Exact(1))
            .unwrap();
        match outcome {
            UpdateOutcome::Updated(updated) => {
                assert_eq!(updated.version, 2);
                assert_eq!(updated.payload.given_name, "b");
            }
            other => panic!("expected update, got {other:?}"),
        }

        let stale = allocator
            .update_record(record.id, payload("c"), ExpectedVersion::Exact(1))
            .unwrap();
        assert_eq!(stale, UpdateOutcome::VersionConflict { actual: 2 });

        let missing = allocator
            .update_record(rid(50), payload("c"), ExpectedVersion::Any)
            .unwrap();
        assert_eq!(missing, UpdateOutcome::NotFound);
    }

    #[test]
    fn config_controls_attempts() {
        let config = CoreConfig {
            allocation_attempts: 3,
            ..CoreConfig::default()
        };
        assert_eq!(AllocatorConfig::from(&config).max_attempts, 3);
    }
}
