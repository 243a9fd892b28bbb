//! `carestock-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no storage, no IO).

pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ActorId, ItemId, MovementId, RecordId, SubjectId};
pub use version::ExpectedVersion;
