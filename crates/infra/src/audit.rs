//! Consistency checker: recompute balances from the log and compare.

use serde::Serialize;
use tracing::{info, warn};

use carestock_core::ItemId;
use carestock_inventory::{MovementFilter, StockItem, net_balances};

use crate::error::OperationError;
use crate::store::Storage;

/// Stored versus recomputed balance for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub item_id: ItemId,
    pub stored_balance: i64,
    pub computed_balance: i64,
    pub matches: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// One entry per audited item, ascending by id.
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| !e.matches)
    }

    pub fn is_consistent(&self) -> bool {
        self.entries.iter().all(|e| e.matches)
    }
}

/// Read-only auditor. Mismatches are reported, never corrected.
#[derive(Debug)]
pub struct ConsistencyChecker<S> {
    storage: S,
}

impl<S> ConsistencyChecker<S>
where
    S: Storage,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Audit one item, or every item when `item_id` is `None`.
    ///
    /// Projection and log are read in the same transaction.
    pub fn audit(&self, item_id: Option<ItemId>) -> Result<AuditReport, OperationError> {
        let (items, movements) = self.storage.transaction(|tx| {
            let items: Vec<StockItem> = match item_id {
                Some(id) => vec![
                    tx.item(id)?
                        .ok_or_else(|| OperationError::NotFound(format!("stock item {id}")))?,
                ],
                None => tx.items()?,
            };
            let filter = item_id.map_or(MovementFilter::All, MovementFilter::Item);
            Ok::<_, OperationError>((items, tx.movements(filter)?))
        })?;

        let computed = net_balances(&movements)?;
        let entries: Vec<AuditEntry> = items
            .into_iter()
            .map(|item| {
                let computed_balance = computed.get(&item.id).copied().unwrap_or(0);
                AuditEntry {
                    item_id: item.id,
                    stored_balance: item.quantity,
                    computed_balance,
                    matches: item.quantity == computed_balance,
                }
            })
            .collect();

        let report = AuditReport { entries };
        for entry in report.mismatches() {
            warn!(
                item_id = %entry.item_id,
                stored = entry.stored_balance,
                computed = entry.computed_balance,
                "stock projection disagrees with movement log"
            );
        }
        info!(
            audited = report.entries.len(),
            mismatched = report.mismatches().count(),
            "stock audit finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerCoordinator;
    use crate::store::InMemoryStorage;
    use carestock_core::{ActorId, SubjectId};
    use carestock_inventory::{ItemDetails, MovementRequest, OpeningStock};
    use std::sync::Arc;

    type Fixture = (
        Arc<InMemoryStorage>,
        LedgerCoordinator<Arc<InMemoryStorage>>,
        ItemId,
        ItemId,
    );

    fn setup() -> Fixture {
        let store = Arc::new(InMemoryStorage::new());
        let ledger = LedgerCoordinator::new(Arc::clone(&store));
        let actor = ActorId::new(1).unwrap();

        let gloves = ledger
            .register_item(
                ItemDetails::new("Gloves", "PPE"),
                Some(OpeningStock {
                    quantity: 10,
                    actor_id: actor,
                }),
            )
            .unwrap()
            .id;
        let soap = ledger
            .register_item(ItemDetails::new("Soap", "Hygiene"), None)
            .unwrap()
            .id;
        ledger
            .record_movement(MovementRequest::issue(gloves, 4, actor, SubjectId::new(3).unwrap()))
            .unwrap();

        (store, ledger, gloves, soap)
    }

    #[test]
    fn ledger_writes_audit_clean() {
        let (store, _ledger, gloves, soap) = setup();
        let report = ConsistencyChecker::new(store).audit(None).unwrap();

        assert!(report.is_consistent());
        assert_eq!(report.entries.len(), 2);
        assert_eq!(
            report.entries[0],
            AuditEntry {
                item_id: gloves,
                stored_balance: 6,
                computed_balance: 6,
                matches: true
            }
        );
        assert_eq!(report.entries[1].item_id, soap);
        assert_eq!(report.entries[1].computed_balance, 0);
    }

    #[test]
    fn drifted_projection_is_reported_not_fixed() {
        let (store, ledger, gloves, _soap) = setup();
        store.overwrite_quantity(gloves, 9);

        let checker = ConsistencyChecker::new(Arc::clone(&store));
        let report = checker.audit(Some(gloves)).unwrap();
        assert!(!report.is_consistent());

        let mismatches: Vec<_> = report.mismatches().collect();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].stored_balance, 9);
        assert_eq!(mismatches[0].computed_balance, 6);

        assert_eq!(ledger.balance(gloves).unwrap(), 9);
    }

    #[test]
    fn unknown_item_is_not_found() {
        let (store, ..) = setup();
        let err = ConsistencyChecker::new(store)
            .audit(Some(ItemId::new(77).unwrap()))
            .unwrap_err();
        assert!(matches!(err, OperationError::NotFound(_)));
    }

    #[test]
    fn report_serializes_for_operators() {
        let (store, ..) = setup();
        let report = ConsistencyChecker::new(store).audit(None).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entries"][0]["stored_balance"], 6);
        assert_eq!(json["entries"][0]["matches"], true);
    }
}
