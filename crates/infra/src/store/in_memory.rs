use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use carestock_core::{Entity, ExpectedVersion, ItemId, MovementId, RecordId};
use carestock_inventory::{
    ItemDetails, MovementFilter, MovementRecord, NewMovement, QuantityChange, StockItem,
};
use carestock_registry::{
    Allocation, RecordPayload, RegistryRecord, UpdateOutcome, choose_identifier, sequential_after,
};

use super::r#trait::{Storage, StorageError, StorageResult, StorageTx};

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<RecordId, RegistryRecord>,
    items: BTreeMap<ItemId, StockItem>,
    /// Append-only; a movement's id is its position + 1.
    movements: Vec<MovementRecord>,
}

/// Inverse of one write, replayed newest-first on rollback.
#[derive(Debug)]
enum Undo {
    RemoveRecord(RecordId),
    RestoreRecord(RegistryRecord),
    RemoveItem(ItemId),
    RestoreItem(StockItem),
    PopMovement,
}

/// In-memory storage engine.
///
/// Intended for tests/dev and for embedding without a database file. A
/// transaction holds the table lock for its whole scope, so transactions are
/// serial. Writes go straight to the tables and are journaled; rollback
/// replays the journal in reverse.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicking transaction rolls back while unwinding, so the tables
        // behind a poisoned lock are still consistent.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite a stored quantity without a movement, to simulate a drifted projection.
    #[cfg(test)]
    pub(crate) fn overwrite_quantity(&self, id: ItemId, quantity: i64) {
        if let Some(item) = self.lock().items.get_mut(&id) {
            item.quantity = quantity;
        }
    }
}

impl Storage for InMemoryStorage {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut tx = InMemoryTx {
            tables: self.lock(),
            journal: Vec::new(),
            committed: false,
        };

        let value = work(&mut tx)?;
        tx.committed = true;
        Ok(value)
    }
}

struct InMemoryTx<'a> {
    tables: MutexGuard<'a, Tables>,
    journal: Vec<Undo>,
    committed: bool,
}

impl InMemoryTx<'_> {
    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::RemoveRecord(id) => {
                    self.tables.records.remove(&id);
                }
                Undo::RestoreRecord(record) => restore(&mut self.tables.records, record),
                Undo::RemoveItem(id) => {
                    self.tables.items.remove(&id);
                }
                Undo::RestoreItem(item) => restore(&mut self.tables.items, item),
                Undo::PopMovement => {
                    self.tables.movements.pop();
                }
            }
        }
    }
}

fn restore<E: Entity>(table: &mut BTreeMap<E::Id, E>, row: E) {
    table.insert(row.id(), row);
}

impl Drop for InMemoryTx<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl StorageTx for InMemoryTx<'_> {
    fn record(&mut self, id: RecordId) -> StorageResult<Option<RegistryRecord>> {
        Ok(self.tables.records.get(&id).cloned())
    }

    fn records(&mut self) -> StorageResult<Vec<RegistryRecord>> {
        Ok(self.tables.records.values().cloned().collect())
    }

    fn choose_record_id(&mut self) -> StorageResult<Allocation> {
        Ok(choose_identifier(self.tables.records.keys().copied()))
    }

    fn insert_record(
        &mut self,
        id: Option<RecordId>,
        payload: &RecordPayload,
    ) -> StorageResult<RegistryRecord> {
        let id = match id {
            Some(id) if self.tables.records.contains_key(&id) => {
                return Err(StorageError::DuplicateKey(format!("registry record {id}")));
            }
            Some(id) => id,
            None => sequential_after(self.tables.records.keys().next_back().copied()),
        };

        let record = RegistryRecord::new(id, payload.clone());
        self.tables.records.insert(id, record.clone());
        self.journal.push(Undo::RemoveRecord(id));
        Ok(record)
    }

    fn update_record(
        &mut self,
        id: RecordId,
        payload: &RecordPayload,
        expected: ExpectedVersion,
    ) -> StorageResult<UpdateOutcome> {
        let Some(current) = self.tables.records.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if !expected.matches(current.version) {
            return Ok(UpdateOutcome::VersionConflict {
                actual: current.version,
            });
        }

        let before = current.clone();
        current.payload = payload.clone();
        current.version += 1;
        let updated = current.clone();
        self.journal.push(Undo::RestoreRecord(before));
        Ok(UpdateOutcome::Updated(updated))
    }

    fn delete_record(&mut self, id: RecordId) -> StorageResult<bool> {
        match self.tables.records.remove(&id) {
            Some(removed) => {
                self.journal.push(Undo::RestoreRecord(removed));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert_item(&mut self, details: &ItemDetails) -> StorageResult<StockItem> {
        let next = self
            .tables
            .items
            .keys()
            .next_back()
            .map(|id| id.get() + 1)
            .unwrap_or(1);
        let id = ItemId::from_raw(next);

        let item = StockItem::from_details(id, details.clone());
        self.tables.items.insert(id, item.clone());
        self.journal.push(Undo::RemoveItem(id));
        Ok(item)
    }

    fn item(&mut self, id: ItemId) -> StorageResult<Option<StockItem>> {
        Ok(self.tables.items.get(&id).cloned())
    }

    fn items(&mut self) -> StorageResult<Vec<StockItem>> {
        Ok(self.tables.items.values().cloned().collect())
    }

    fn update_item_details(&mut self, id: ItemId, details: &ItemDetails) -> StorageResult<bool> {
        let Some(item) = self.tables.items.get_mut(&id) else {
            return Ok(false);
        };
        let before = item.clone();
        item.apply_details(details.clone());
        self.journal.push(Undo::RestoreItem(before));
        Ok(true)
    }

    fn change_quantity(&mut self, id: ItemId, delta: i64) -> StorageResult<QuantityChange> {
        let Some(item) = self.tables.items.get_mut(&id) else {
            return Ok(QuantityChange::UnknownItem);
        };

        let change = QuantityChange::evaluate(item.quantity, delta);
        if let QuantityChange::Applied { quantity } = change {
            let before = item.clone();
            item.quantity = quantity;
            self.journal.push(Undo::RestoreItem(before));
        }
        Ok(change)
    }

    fn append_movement(&mut self, movement: &NewMovement) -> StorageResult<MovementRecord> {
        if !self.tables.items.contains_key(&movement.item_id) {
            return Err(StorageError::Unavailable(format!(
                "movement references missing stock item {}",
                movement.item_id
            )));
        }

        let id = MovementId::from_raw(self.tables.movements.len() as i64 + 1);
        let record = movement.clone().into_record(id);
        self.tables.movements.push(record.clone());
        self.journal.push(Undo::PopMovement);
        Ok(record)
    }

    fn movements(&mut self, filter: MovementFilter) -> StorageResult<Vec<MovementRecord>> {
        Ok(self
            .tables
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carestock_core::ActorId;
    use carestock_inventory::MovementRequest;
    use chrono::Utc;

    fn payload(name: &str) -> RecordPayload {
        RecordPayload::new(name, "Test")
    }

    fn rid(v: i64) -> RecordId {
        RecordId::new(v).unwrap()
    }

    #[test]
    fn committed_writes_are_visible() {
        let store = InMemoryStorage::new();
        store
            .transaction(|tx| tx.insert_record(None, &payload("a")))
            .unwrap();

        let records = store.transaction(|tx| tx.records()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, rid(1));
    }

    #[test]
    fn error_rolls_back_every_write_in_the_scope() {
        let store = InMemoryStorage::new();
        let item = store
            .transaction(|tx| tx.insert_item(&ItemDetails::new("Gloves", "PPE")))
            .unwrap();

        let result: Result<(), StorageError> = store.transaction(|tx| {
            tx.insert_record(None, &payload("a"))?;
            tx.change_quantity(item.id, 5)?;
            let movement = MovementRequest::restock(item.id, 5, ActorId::new(1).unwrap())
                .into_new(Utc::now());
            tx.append_movement(&movement)?;
            Err(StorageError::Unavailable("boom".to_string()))
        });
        assert!(result.is_err());

        store
            .transaction(|tx| {
                assert!(tx.records()?.is_empty());
                assert_eq!(tx.item(item.id)?.unwrap().quantity, 0);
                assert!(tx.movements(MovementFilter::All)?.is_empty());
                Ok::<_, StorageError>(())
            })
            .unwrap();
    }

    #[test]
    fn panic_inside_scope_rolls_back_and_store_stays_usable() {
        let store = InMemoryStorage::new();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), StorageError> = store.transaction(|tx| {
                tx.insert_record(None, &payload("a"))?;
                panic!("collaborator bug");
            });
        }));
        assert!(outcome.is_err());

        let records = store.transaction(|tx| tx.records()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn explicit_insert_rejects_taken_id() {
        let store = InMemoryStorage::new();
        store
            .transaction(|tx| tx.insert_record(Some(rid(1)), &payload("a")))
            .unwrap();

        let err = store
            .transaction(|tx| tx.insert_record(Some(rid(1)), &payload("b")))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));
    }

    #[test]
    fn sequential_insert_follows_current_maximum() {
        let store = InMemoryStorage::new();
        let record = store
            .transaction(|tx| {
                tx.insert_record(Some(rid(4)), &payload("a"))?;
                tx.insert_record(None, &payload("b"))
            })
            .unwrap();
        assert_eq!(record.id, rid(5));
    }

    #[test]
    fn change_quantity_refuses_to_go_negative() {
        let store = InMemoryStorage::new();
        let item = store
            .transaction(|tx| tx.insert_item(&ItemDetails::new("Gloves", "PPE")))
            .unwrap();

        let change = store
            .transaction(|tx| {
                tx.change_quantity(item.id, 3)?;
                tx.change_quantity(item.id, -4)
            })
            .unwrap();
        assert_eq!(change, QuantityChange::Insufficient { available: 3 });

        let missing = store
            .transaction(|tx| tx.change_quantity(ItemId::new(99).unwrap(), 1))
            .unwrap();
        assert_eq!(missing, QuantityChange::UnknownItem);
    }

    #[test]
    fn change_quantity_refuses_to_overflow() {
        let store = InMemoryStorage::new();
        let item = store
            .transaction(|tx| tx.insert_item(&ItemDetails::new("Gloves", "PPE")))
            .unwrap();

        let change = store
            .transaction(|tx| {
                tx.change_quantity(item.id, i64::MAX)?;
                tx.change_quantity(item.id, 1)
            })
            .unwrap();
        assert_eq!(change, QuantityChange::Overflow { available: i64::MAX });

        let stored = store.transaction(|tx| tx.item(item.id)).unwrap().unwrap();
        assert_eq!(stored.quantity, i64::MAX);
    }

    #[test]
    fn update_distinguishes_missing_from_stale() {
        let store = InMemoryStorage::new();
        store
            .transaction(|tx| tx.insert_record(None, &payload("a")))
            .unwrap();

        let stale = store
            .transaction(|tx| tx.update_record(rid(1), &payload("b"), ExpectedVersion::Exact(7)))
            .unwrap();
        assert_eq!(stale, UpdateOutcome::VersionConflict { actual: 1 });

        let missing = store
            .transaction(|tx| tx.update_record(rid(2), &payload("b"), ExpectedVersion::Any))
            .unwrap();
        assert_eq!(missing, UpdateOutcome::NotFound);
    }
}
