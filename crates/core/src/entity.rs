//! Entity trait: identity + continuity across snapshots.

/// Entity marker + minimal interface.
///
/// Two snapshots of the same entity share an id even when every other field
/// changed between fetches.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
