//! Infrastructure layer: storage engines, transaction scoping, and the core
//! services built on them.
//!
//! Domain crates decide; this crate makes the decisions durable. Every
//! mutation runs inside a [`store::Storage::transaction`] scope owned by one of
//! the services below.

pub mod allocator;
pub mod audit;
pub mod config;
pub mod error;
pub mod ledger;
pub mod services;
pub mod store;


pub use allocator::{AllocatorConfig, IdentifierAllocator};
pub use audit::{AuditEntry, AuditReport, ConsistencyChecker};
pub use config::{ConfigError, CoreConfig};
pub use error::OperationError;
pub use ledger::LedgerCoordinator;
pub use services::CoreServices;
