//! Store traits consumed by the validation engine.
//!
//! - [`PrimaryStore`]: the authoritative database
//! - [`SearchIndex`]: the derived search index
//!
//! Both are read-only from the engine's perspective. Implementations resolve
//! entity-specific details (tables, index names, filters, compared fields)
//! from their own configuration, so the engine only passes an [`EntityType`].
//! Errors are plain [`HealthError`]s; the engine tags them with the store side
//! when it downgrades them to report records.

use async_trait::async_trait;

use crate::error::Result;
use crate::verify::Window;

use super::entity::EntityType;
use super::value::Document;

#[cfg(doc)]
use crate::error::HealthError;

/// Read access to the primary database.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// Subtypes used to scope count comparisons (post types, or a single
    /// `"all"` subtype for entities that are not split).
    async fn subtypes(&self, entity: EntityType) -> Result<Vec<String>>;

    /// Number of indexable records of `subtype`.
    async fn count(&self, entity: EntityType, subtype: &str) -> Result<u64>;

    /// Indexable records with ids inside `window`, with the compared fields filled in.
    async fn fetch_range(&self, entity: EntityType, window: Window) -> Result<Vec<Document>>;

    /// Highest indexable id, `None` when there are no records.
    async fn max_id(&self, entity: EntityType) -> Result<Option<i64>>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<()>;

    /// Short label for logs (e.g. "mysql").
    fn store_type(&self) -> &str;
}

/// Read access to the search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Number of documents of `subtype`, filtered the same way as the database count.
    async fn count(&self, entity: EntityType, subtype: &str) -> Result<u64>;

    /// Documents with ids inside `window`, with the compared fields filled in.
    async fn fetch_range(&self, entity: EntityType, window: Window) -> Result<Vec<Document>>;

    /// Highest indexed id, `None` when the index is empty.
    async fn max_id(&self, entity: EntityType) -> Result<Option<i64>>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<()>;

    /// Short label for logs (e.g. "elasticsearch").
    fn store_type(&self) -> &str;
}
