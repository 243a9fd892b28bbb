//! Stored rows addressed by a typed identifier.

/// A registry record, stock item or movement: anything persisted under its own id.
///
/// Ids are small `Copy` newtypes ordered like the integers they wrap, so tables
/// can be kept in id order.
pub trait Entity {
    type Id: Copy + Ord + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
