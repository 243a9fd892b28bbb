//! Fault-injecting storage adapter.
//!
//! Wraps any [`Storage`] and fails chosen operations on demand, after the
//! operations before them in the same transaction have already succeeded.
//! Used to verify that a failure between two writes rolls both back.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use carestock_core::{ExpectedVersion, ItemId, RecordId};
use carestock_inventory::{
    ItemDetails, MovementFilter, MovementRecord, NewMovement, QuantityChange, StockItem,
};
use carestock_registry::{Allocation, RecordPayload, RegistryRecord, UpdateOutcome};

use super::r#trait::{Storage, StorageError, StorageResult, StorageTx};

/// Where a fault can be injected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    ChooseRecordId,
    InsertRecord,
    UpdateRecord,
    DeleteRecord,
    InsertItem,
    ChangeQuantity,
    AppendMovement,
    /// After the work succeeded, before the engine commits.
    Commit,
}

/// What the injected failure looks like.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InjectedFault {
    Unavailable,
    DuplicateKey,
}

impl InjectedFault {
    fn at(self, point: FaultPoint) -> StorageError {
        match self {
            InjectedFault::Unavailable => {
                StorageError::Unavailable(format!("injected fault at {point:?}"))
            }
            InjectedFault::DuplicateKey => {
                StorageError::DuplicateKey(format!("injected fault at {point:?}"))
            }
        }
    }
}

/// Queue of armed faults per point. Each armed fault fires once.
#[derive(Debug, Default)]
pub struct FaultPlan {
    armed: Mutex<HashMap<FaultPoint, VecDeque<InjectedFault>>>,
}

impl FaultPlan {
    pub fn arm(&self, point: FaultPoint, fault: InjectedFault) {
        self.arm_times(point, fault, 1);
    }

    pub fn arm_times(&self, point: FaultPoint, fault: InjectedFault, times: usize) {
        let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        armed.entry(point).or_default().extend(std::iter::repeat_n(fault, times));
    }

    /// Faults still waiting to fire at `point`.
    pub fn pending(&self, point: FaultPoint) -> usize {
        let armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        armed.get(&point).map_or(0, VecDeque::len)
    }

    pub fn disarm_all(&self) {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn trip(&self, point: FaultPoint) -> StorageResult<()> {
        let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        match armed.get_mut(&point).and_then(VecDeque::pop_front) {
            Some(fault) => {
                tracing::debug!(?point, ?fault, "injecting storage fault");
                Err(fault.at(point))
            }
            None => Ok(()),
        }
    }
}

/// Storage adapter that consults a [`FaultPlan`] before delegating.
#[derive(Debug, Default)]
pub struct FaultyStorage<S> {
    inner: S,
    plan: FaultPlan,
}

impl<S> FaultyStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            plan: FaultPlan::default(),
        }
    }

    pub fn plan(&self) -> &FaultPlan {
        &self.plan
    }
}

impl<S> Storage for FaultyStorage<S>
where
    S: Storage,
{
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<T, E>,
        E: From<StorageError>,
    {
        self.plan.trip(FaultPoint::Begin)?;

        self.inner.transaction(|tx| {
            let mut faulty = FaultyTx {
                inner: tx,
                plan: &self.plan,
            };
            let value = work(&mut faulty)?;
            // Failing here makes the inner engine roll back the finished work.
            self.plan.trip(FaultPoint::Commit)?;
            Ok(value)
        })
    }
}

struct FaultyTx<'a> {
    inner: &'a mut dyn StorageTx,
    plan: &'a FaultPlan,
}

impl StorageTx for FaultyTx<'_> {
    fn record(&mut self, id: RecordId) -> StorageResult<Option<RegistryRecord>> {
        self.inner.record(id)
    }

    fn records(&mut self) -> StorageResult<Vec<RegistryRecord>> {
        self.inner.records()
    }

    fn choose_record_id(&mut self) -> StorageResult<Allocation> {
        self.plan.trip(FaultPoint::ChooseRecordId)?;
        self.inner.choose_record_id()
    }

    fn insert_record(
        &mut self,
        id: Option<RecordId>,
        payload: &RecordPayload,
    ) -> StorageResult<RegistryRecord> {
        self.plan.trip(FaultPoint::InsertRecord)?;
        self.inner.insert_record(id, payload)
    }

    fn update_record(
        &mut self,
        id: RecordId,
        payload: &RecordPayload,
        expected: ExpectedVersion,
    ) -> StorageResult<UpdateOutcome> {
        self.plan.trip(FaultPoint::UpdateRecord)?;
        self.inner.update_record(id, payload, expected)
    }

    fn delete_record(&mut self, id: RecordId) -> StorageResult<bool> {
        self.plan.trip(FaultPoint::DeleteRecord)?;
        self.inner.delete_record(id)
    }

    fn insert_item(&mut self, details: &ItemDetails) -> StorageResult<StockItem> {
        self.plan.trip(FaultPoint::InsertItem)?;
        self.inner.insert_item(details)
    }

    fn item(&mut self, id: ItemId) -> StorageResult<Option<StockItem>> {
        self.inner.item(id)
    }

    fn items(&mut self) -> StorageResult<Vec<StockItem>> {
        self.inner.items()
    }

    fn update_item_details(&mut self, id: ItemId, details: &ItemDetails) -> StorageResult<bool> {
        self.inner.update_item_details(id, details)
    }

    fn change_quantity(&mut self, id: ItemId, delta: i64) -> StorageResult<QuantityChange> {
        self.plan.trip(FaultPoint::ChangeQuantity)?;
        self.inner.change_quantity(id, delta)
    }

    fn append_movement(&mut self, movement: &NewMovement) -> StorageResult<MovementRecord> {
        self.plan.trip(FaultPoint::AppendMovement)?;
        self.inner.append_movement(movement)
    }

    fn movements(&mut self, filter: MovementFilter) -> StorageResult<Vec<MovementRecord>> {
        self.inner.movements(filter)
    }
}
