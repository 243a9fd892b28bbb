//! Ledger coordinator: the only writer of stock quantities.
//!
//! Every stock-affecting action updates the projection and appends to the
//! movement log inside one storage transaction, so the stored quantity of an
//! item always equals the net sum of its movements.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use carestock_core::{ItemId, SubjectId};
use carestock_inventory::{
    ItemDetails, MovementFilter, MovementForm, MovementKind, MovementRecord, MovementRequest,
    OpeningStock, StockItem, sort_most_recent_first,
};

use crate::error::OperationError;
use crate::store::{Storage, StorageTx};

#[derive(Debug)]
pub struct LedgerCoordinator<S> {
    storage: S,
}

impl<S> LedgerCoordinator<S>
where
    S: Storage,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Create an item at quantity zero, optionally followed by an opening RESTOCK.
    pub fn register_item(
        &self,
        details: ItemDetails,
        opening: Option<OpeningStock>,
    ) -> Result<StockItem, OperationError> {
        details.validate()?;
        let opening = opening.filter(|o| o.quantity != 0);
        if let Some(o) = opening {
            if o.quantity < 0 {
                return Err(OperationError::ConstraintViolation(format!(
                    "opening stock must not be negative (got {})",
                    o.quantity
                )));
            }
        }

        let item = self.storage.transaction(|tx| {
            let item = tx.insert_item(&details)?;
            let Some(o) = opening else {
                return Ok::<_, OperationError>(item);
            };

            let request = MovementRequest::restock(item.id, o.quantity, o.actor_id)
                .with_remark("opening stock");
            apply(tx, request)?;
            tx.item(item.id)?
                .ok_or_else(|| OperationError::NotFound(format!("stock item {}", item.id)))
        })?;

        info!(item_id = %item.id, quantity = item.quantity, "stock item registered");
        Ok(item)
    }

    /// Change name, category or expiry. The quantity is not reachable from here.
    pub fn update_item_details(
        &self,
        id: ItemId,
        details: ItemDetails,
    ) -> Result<bool, OperationError> {
        details.validate()?;
        let updated = self
            .storage
            .transaction(|tx| tx.update_item_details(id, &details).map_err(OperationError::from))?;
        if updated {
            debug!(item_id = %id, "stock item details updated");
        }
        Ok(updated)
    }

    pub fn item(&self, id: ItemId) -> Result<Option<StockItem>, OperationError> {
        self.storage.transaction(|tx| tx.item(id).map_err(OperationError::from))
    }

    pub fn items(&self) -> Result<Vec<StockItem>, OperationError> {
        self.storage.transaction(|tx| tx.items().map_err(OperationError::from))
    }

    /// Items whose expiration date is on or before `date`, soonest first.
    pub fn expiring_on_or_before(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<StockItem>, OperationError> {
        let mut items: Vec<StockItem> = self
            .items()?
            .into_iter()
            .filter(|item| item.expires_on_or_before(date))
            .collect();
        items.sort_by(|a, b| a.expires_on.cmp(&b.expires_on).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    /// Decode an untyped form and record it.
    pub fn submit(&self, form: MovementForm) -> Result<MovementRecord, OperationError> {
        let request = MovementRequest::try_from(form)?;
        self.record_movement(request)
    }

    /// Apply one movement to the projection and the log, or to neither.
    pub fn record_movement(
        &self,
        request: MovementRequest,
    ) -> Result<MovementRecord, OperationError> {
        request.validate()?;

        let item_id = request.item_id;
        let kind = request.kind;
        let quantity = request.quantity;

        match self.storage.transaction(|tx| apply(tx, request)) {
            Ok(movement) => {
                info!(
                    movement_id = %movement.id,
                    item_id = %item_id,
                    %kind,
                    quantity,
                    "stock movement recorded"
                );
                Ok(movement)
            }
            Err(err @ OperationError::InsufficientStock { .. }) => {
                warn!(
                    item_id = %item_id,
                    %kind,
                    quantity,
                    error = %err,
                    "stock movement rejected"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Stored on-hand quantity.
    pub fn balance(&self, id: ItemId) -> Result<i64, OperationError> {
        self.item(id)?
            .map(|item| item.quantity)
            .ok_or_else(|| OperationError::NotFound(format!("stock item {id}")))
    }

    /// Movements of one item, most recent first.
    pub fn history(&self, id: ItemId) -> Result<Vec<MovementRecord>, OperationError> {
        self.storage.transaction(|tx| {
            if tx.item(id)?.is_none() {
                return Err(OperationError::NotFound(format!("stock item {id}")));
            }
            sorted(tx, MovementFilter::Item(id))
        })
    }

    pub fn history_by_kind(
        &self,
        kind: MovementKind,
    ) -> Result<Vec<MovementRecord>, OperationError> {
        self.storage.transaction(|tx| sorted(tx, MovementFilter::Kind(kind)))
    }

    pub fn history_by_subject(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<MovementRecord>, OperationError> {
        self.storage.transaction(|tx| sorted(tx, MovementFilter::Subject(subject)))
    }
}

/// Conditional projection update followed by the log append, inside `tx`.
fn apply(
    tx: &mut dyn StorageTx,
    request: MovementRequest,
) -> Result<MovementRecord, OperationError> {
    let quantity = tx
        .change_quantity(request.item_id, request.delta())?
        .into_result(request.item_id, request.quantity)?;
    debug!(item_id = %request.item_id, quantity, "projection updated");

    let movement = request.into_new(Utc::now());
    Ok(tx.append_movement(&movement)?)
}

fn sorted(
    tx: &mut dyn StorageTx,
    filter: MovementFilter,
) -> Result<Vec<MovementRecord>, OperationError> {
    let mut movements = tx.movements(filter)?;
    sort_most_recent_first(&mut movements);
    Ok(movements)
}
