use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use carestock_core::{ActorId, DomainError, DomainResult, Entity, ItemId};

/// Current-balance projection row for one stocked item.
///
/// `quantity` is derived state: only the ledger coordinator changes it, and it
/// always equals the net sum of the item's movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub expires_on: Option<NaiveDate>,
}

impl StockItem {
    pub fn from_details(id: ItemId, details: ItemDetails) -> Self {
        Self {
            id,
            name: details.name,
            category: details.category,
            quantity: 0,
            expires_on: details.expires_on,
        }
    }

    /// Replace descriptive fields, leaving the quantity alone.
    pub fn apply_details(&mut self, details: ItemDetails) {
        self.name = details.name;
        self.category = details.category;
        self.expires_on = details.expires_on;
    }

    pub fn expires_on_or_before(&self, date: NaiveDate) -> bool {
        self.expires_on.is_some_and(|d| d <= date)
    }
}

impl Entity for StockItem {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

/// Descriptive fields of an item: everything except the quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
}

impl ItemDetails {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            expires_on: None,
        }
    }

    pub fn expiring(mut self, date: NaiveDate) -> Self {
        self.expires_on = Some(date);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::constraint("item name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::constraint("item category cannot be empty"));
        }
        Ok(())
    }
}

/// Quantity on hand when an item is first registered.
///
/// Recorded as a RESTOCK by `actor_id` so the ledger explains it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningStock {
    pub quantity: i64,
    pub actor_id: ActorId,
}

/// Outcome of a conditional quantity change against the live projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuantityChange {
    /// Applied; `quantity` is the new on-hand value.
    Applied { quantity: i64 },
    /// Rejected because the result would be negative. Nothing was written.
    Insufficient { available: i64 },
    /// Rejected because the result would not fit in an `i64`. Nothing was written.
    Overflow { available: i64 },
    /// No such item.
    UnknownItem,
}

impl QuantityChange {
    /// Evaluate `delta` against the live on-hand quantity.
    pub fn evaluate(available: i64, delta: i64) -> Self {
        match available.checked_add(delta) {
            None => QuantityChange::Overflow { available },
            Some(next) if next < 0 => QuantityChange::Insufficient { available },
            Some(quantity) => QuantityChange::Applied { quantity },
        }
    }

    /// New on-hand quantity, or the domain error explaining the refusal.
    pub fn into_result(self, item_id: ItemId, requested: i64) -> DomainResult<i64> {
        match self {
            QuantityChange::Applied { quantity } => Ok(quantity),
            QuantityChange::Insufficient { available } => Err(DomainError::InsufficientStock {
                item_id,
                requested,
                available,
            }),
            QuantityChange::Overflow { available } => Err(DomainError::constraint(format!(
                "quantity of stock item {item_id} would overflow \
                 (on hand {available}, change {requested})"
            ))),
            QuantityChange::UnknownItem => {
                Err(DomainError::not_found(format!("stock item {item_id}")))
            }
        }
    }
}
