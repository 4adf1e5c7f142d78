//! Catalog domain module.
//!
//! This crate contains the client-side derivation rules for the product
//! catalog, implemented purely as deterministic logic (no IO, no HTTP, no
//! storage): numeric coercion of backend records, the filter/sort projection,
//! and the selection set.

pub mod product;
pub mod projection;
pub mod selection;

pub use product::{Amount, Product, SortKey, coerce_number};
pub use projection::{
    Facets, FilterLayer, SortDirective, SortField, SortOrder, ViewQuery, VisibilityPolicy,
    compare, facets, locale_cmp, project,
};
pub use selection::SelectionTracker;
