//! Paired reads against both stores.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::{Document, EntityType, PrimaryStore, SearchIndex};
use crate::error::{FetchError, FetchScope, Result, StoreSide};

use super::types::Window;

/// Documents of one window as returned by each store.
///
/// The two sides may differ in length and order; reconcile by id.
#[derive(Debug, Clone)]
pub struct Page {
    pub window: Window,
    pub primary: Vec<Document>,
    pub index: Vec<Document>,
}

impl Page {
    /// Neither store returned a document.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.index.is_empty()
    }
}

/// Counts of one subtype in both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub primary: u64,
    pub index: u64,
}

/// Issues the same read against both stores concurrently, each bounded by a timeout.
///
/// Failures are tagged with the store they came from. When both sides fail,
/// the database failure is returned and the index failure is only logged.
#[derive(Clone)]
pub struct PageFetcher {
    primary: Arc<dyn PrimaryStore>,
    index: Arc<dyn SearchIndex>,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        index: Arc<dyn SearchIndex>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            index,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch one window from both stores.
    pub async fn fetch_page(
        &self,
        entity: EntityType,
        window: Window,
    ) -> std::result::Result<Page, FetchError> {
        let scope = FetchScope::from(window);
        let (primary, index) = tokio::join!(
            self.bounded(
                StoreSide::Primary,
                entity,
                &scope,
                self.primary.fetch_range(entity, window)
            ),
            self.bounded(
                StoreSide::Index,
                entity,
                &scope,
                self.index.fetch_range(entity, window)
            )
        );
        let (primary, index) = pick(primary, index)?;

        debug!(
            "{} window {}: {} db documents, {} es documents",
            entity,
            window,
            primary.len(),
            index.len()
        );

        Ok(Page {
            window,
            primary,
            index,
        })
    }

    /// Count one subtype in both stores.
    pub async fn count(
        &self,
        entity: EntityType,
        subtype: &str,
    ) -> std::result::Result<Totals, FetchError> {
        let scope = FetchScope::Subtype {
            subtype: subtype.to_string(),
        };
        let (primary, index) = tokio::join!(
            self.bounded(
                StoreSide::Primary,
                entity,
                &scope,
                self.primary.count(entity, subtype)
            ),
            self.bounded(
                StoreSide::Index,
                entity,
                &scope,
                self.index.count(entity, subtype)
            )
        );
        let (primary, index) = pick(primary, index)?;
        Ok(Totals { primary, index })
    }

    /// Highest id currently in each store, `None` for an empty side.
    pub async fn max_ids(
        &self,
        entity: EntityType,
    ) -> std::result::Result<(Option<i64>, Option<i64>), FetchError> {
        let scope = FetchScope::Entity;
        let (primary, index) = tokio::join!(
            self.bounded(StoreSide::Primary, entity, &scope, self.primary.max_id(entity)),
            self.bounded(StoreSide::Index, entity, &scope, self.index.max_id(entity))
        );
        pick(primary, index)
    }

    /// Subtypes to count, as enumerated by the database.
    pub async fn subtypes(
        &self,
        entity: EntityType,
    ) -> std::result::Result<Vec<String>, FetchError> {
        self.bounded(
            StoreSide::Primary,
            entity,
            &FetchScope::Entity,
            self.primary.subtypes(entity),
        )
        .await
    }

    async fn bounded<T, F>(
        &self,
        side: StoreSide,
        entity: EntityType,
        scope: &FetchScope,
        call: F,
    ) -> std::result::Result<T, FetchError>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(FetchError::new(side, entity, scope.clone(), e.to_string())),
            Err(_) => Err(FetchError::new(
                side,
                entity,
                scope.clone(),
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

fn pick<P, I>(
    primary: std::result::Result<P, FetchError>,
    index: std::result::Result<I, FetchError>,
) -> std::result::Result<(P, I), FetchError> {
    match (primary, index) {
        (Ok(p), Ok(i)) => Ok((p, i)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(primary_err), Err(index_err)) => {
            warn!("{}", index_err);
            Err(primary_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn fetcher(primary: MemoryStore, index: MemoryStore) -> PageFetcher {
        PageFetcher::new(Arc::new(primary), Arc::new(index), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_fetch_page_returns_both_sides() {
        let primary = MemoryStore::new().with_posts([1, 2, 3]);
        let index = MemoryStore::new().with_posts([1, 3]);
        let page = fetcher(primary, index)
            .fetch_page(EntityType::Post, Window::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.primary.len(), 3);
        assert_eq!(page.index.len(), 2);
        assert!(!page.is_empty());
    }

    #[tokio::test]
    async fn test_failure_names_side_and_window() {
        let primary = MemoryStore::new().with_posts([1]);
        let index = MemoryStore::new().with_posts([1]).fail_window(Window::new(1, 10));
        let err = fetcher(primary, index)
            .fetch_page(EntityType::Post, Window::new(1, 10))
            .await
            .unwrap_err();
        assert_eq!(err.side, StoreSide::Index);
        assert_eq!(
            err.scope,
            FetchScope::Window {
                start_id: 1,
                end_id: 10
            }
        );
    }

    #[tokio::test]
    async fn test_primary_failure_wins_when_both_fail() {
        let window = Window::new(1, 10);
        let primary = MemoryStore::new().fail_window(window);
        let index = MemoryStore::new().fail_window(window);
        let err = fetcher(primary, index)
            .fetch_page(EntityType::Post, window)
            .await
            .unwrap_err();
        assert_eq!(err.side, StoreSide::Primary);
    }

    #[tokio::test]
    async fn test_timeout_is_fetch_error() {
        let primary = MemoryStore::new().with_count(EntityType::Post, "page", 3);
        let index = MemoryStore::new()
            .with_count(EntityType::Post, "page", 3)
            .slow_subtype("page", Duration::from_secs(5));
        let err = fetcher(primary, index)
            .count(EntityType::Post, "page")
            .await
            .unwrap_err();
        assert_eq!(err.side, StoreSide::Index);
        assert!(err.message.contains("timed out"));
    }
}
