//! Transactional storage boundary.
//!
//! The registry, stock projection and movement log are three tables of one
//! storage engine. Every logical operation runs inside
//! [`Storage::transaction`], which commits when the closure returns `Ok` and
//! rolls back on `Err` (or when the closure unwinds).

pub mod faulty;
pub mod in_memory;
pub mod sqlite;
pub mod r#trait;

pub use faulty::{FaultPlan, FaultPoint, FaultyStorage, InjectedFault};
pub use in_memory::InMemoryStorage;
pub use r#trait::{Storage, StorageError, StorageResult, StorageTx};
pub use sqlite::SqliteStorage;
