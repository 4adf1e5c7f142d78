//! `pricelist-core`: shared building blocks for the catalog viewer.
//!
//! This crate contains **pure domain** primitives (no IO, no HTTP).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::ProductId;
pub use value_object::ValueObject;
