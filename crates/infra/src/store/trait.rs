use std::sync::Arc;

use thiserror::Error;

use carestock_core::{ExpectedVersion, ItemId, RecordId};
use carestock_inventory::{
    ItemDetails, MovementFilter, MovementRecord, NewMovement, QuantityChange, StockItem,
};
use carestock_registry::{Allocation, RecordPayload, RegistryRecord, UpdateOutcome};

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage engine failure.
///
/// These are **infrastructure errors** as opposed to domain errors. The
/// services translate them into `OperationError` after the transaction has
/// been rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The engine could not be reached, timed out, or failed mid-statement.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A primary-key insert collided with an existing row.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A persisted row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Operations available inside one open transaction.
///
/// All three stores are reached through the same handle, so every write made
/// here commits or rolls back together.
///
/// ## Implementation Requirements
///
/// - `choose_record_id` must see the same snapshot the following
///   `insert_record` writes into
/// - `insert_record` with an explicit id must fail with
///   [`StorageError::DuplicateKey`] if the id is taken
/// - `insert_record` without an id assigns `max(id) + 1`
/// - `change_quantity` must check and apply in one step against the live
///   quantity and never store a negative value
/// - `append_movement` assigns increasing identifiers and never rewrites rows
pub trait StorageTx {
    // Registry store.

    fn record(&mut self, id: RecordId) -> StorageResult<Option<RegistryRecord>>;

    /// All records, ascending by id.
    fn records(&mut self) -> StorageResult<Vec<RegistryRecord>>;

    /// Apply the identifier reuse rule to the records visible in this transaction.
    fn choose_record_id(&mut self) -> StorageResult<Allocation>;

    fn insert_record(
        &mut self,
        id: Option<RecordId>,
        payload: &RecordPayload,
    ) -> StorageResult<RegistryRecord>;

    fn update_record(
        &mut self,
        id: RecordId,
        payload: &RecordPayload,
        expected: ExpectedVersion,
    ) -> StorageResult<UpdateOutcome>;

    /// Returns `false` if there was nothing to delete.
    fn delete_record(&mut self, id: RecordId) -> StorageResult<bool>;

    // Stock projection store.

    /// Insert at quantity zero.
    fn insert_item(&mut self, details: &ItemDetails) -> StorageResult<StockItem>;

    fn item(&mut self, id: ItemId) -> StorageResult<Option<StockItem>>;

    /// All items, ascending by id.
    fn items(&mut self) -> StorageResult<Vec<StockItem>>;

    /// Returns `false` if the item does not exist.
    fn update_item_details(&mut self, id: ItemId, details: &ItemDetails) -> StorageResult<bool>;

    /// Add `delta` to the on-hand quantity unless the result would be negative.
    fn change_quantity(&mut self, id: ItemId, delta: i64) -> StorageResult<QuantityChange>;

    // Movement log store.

    fn append_movement(&mut self, movement: &NewMovement) -> StorageResult<MovementRecord>;

    /// Matching movements, in no particular order.
    fn movements(&mut self, filter: MovementFilter) -> StorageResult<Vec<MovementRecord>>;
}

/// A storage engine offering scoped transactions.
///
/// `transaction` opens a transaction, hands it to `work`, then commits if
/// `work` returned `Ok` and rolls back otherwise. A failed commit is reported
/// as the error and leaves nothing behind.
pub trait Storage: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<T, E>,
        E: From<StorageError>;
}

impl<S> Storage for Arc<S>
where
    S: Storage,
{
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<T, E>,
        E: From<StorageError>,
    {
        (**self).transaction(work)
    }
}
