//! Core abstractions shared by the stores and the validation engine.
//!
//! - [`entity`]: entity kinds present in both stores
//! - [`value`]: documents, field values and compared-field specifications
//! - [`traits`]: the [`PrimaryStore`] and [`SearchIndex`] store traits
//! - [`identifier`]: identifier validation and quoting for dynamic queries
//!
//! The engine only depends on the traits, so it can be exercised with
//! in-memory stores and new backends can be added without touching it.

pub mod entity;
pub mod identifier;
pub mod traits;
pub mod value;

pub use entity::{EntityType, ALL_SUBTYPES};
pub use traits::{PrimaryStore, SearchIndex};
pub use value::{Document, FieldKind, FieldSpec, FieldValue};
