//! Inventory domain module.
//!
//! This crate contains the business rules for stocked items and the movement
//! ledger, implemented purely as deterministic domain logic (no IO, no
//! storage). Keeping the projection and the log in step is the job of the
//! ledger coordinator in `carestock-infra`.

pub mod item;
pub mod movement;

pub use item::{ItemDetails, OpeningStock, QuantityChange, StockItem};
pub use movement::{
    MovementFilter, MovementForm, MovementKind, MovementRecord, MovementRequest, NewMovement,
    net_balances, sort_most_recent_first,
};
