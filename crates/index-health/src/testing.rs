//! In-memory stores for engine tests.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ValidationConfig};
use crate::core::{Document, EntityType, PrimaryStore, SearchIndex, ALL_SUBTYPES};
use crate::error::{HealthError, Result};
use crate::verify::Window;

/// Store usable as either side, with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    documents: BTreeMap<EntityType, BTreeMap<i64, Document>>,
    counts: BTreeMap<EntityType, BTreeMap<String, u64>>,
    failing_windows: Vec<Window>,
    slow_subtypes: BTreeMap<String, Duration>,
    slow_windows: Vec<(Window, Duration)>,
    fail_subtype_listing: bool,
    fail_max_id: bool,
    fetches: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

fn unavailable(what: &str) -> HealthError {
    HealthError::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        format!("{} unavailable", what),
    ))
}

/// A published post as both stores would hold it.
pub fn post(id: i64) -> Document {
    Document::new(id)
        .with_field("post_title", format!("Post {}", id).as_str())
        .with_field("post_status", "publish")
        .with_field("post_type", "post")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, entity: EntityType, document: Document) -> Self {
        self.documents
            .entry(entity)
            .or_default()
            .insert(document.id, document);
        self
    }

    pub fn with_posts(self, ids: impl IntoIterator<Item = i64>) -> Self {
        ids.into_iter()
            .fold(self, |store, id| store.with_document(EntityType::Post, post(id)))
    }

    pub fn without(mut self, entity: EntityType, id: i64) -> Self {
        if let Some(documents) = self.documents.get_mut(&entity) {
            documents.remove(&id);
        }
        self
    }

    pub fn with_count(mut self, entity: EntityType, subtype: &str, count: u64) -> Self {
        self.counts
            .entry(entity)
            .or_default()
            .insert(subtype.to_string(), count);
        self
    }

    pub fn fail_window(mut self, window: Window) -> Self {
        self.failing_windows.push(window);
        self
    }

    pub fn slow_subtype(mut self, subtype: &str, delay: Duration) -> Self {
        self.slow_subtypes.insert(subtype.to_string(), delay);
        self
    }

    pub fn slow_window(mut self, window: Window, delay: Duration) -> Self {
        self.slow_windows.push((window, delay));
        self
    }

    pub fn fail_subtype_listing(mut self) -> Self {
        self.fail_subtype_listing = true;
        self
    }

    pub fn fail_max_id(mut self) -> Self {
        self.fail_max_id = true;
        self
    }

    /// Cancel `token` once `fetches` range reads have been served.
    pub fn cancel_after(mut self, fetches: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((fetches, token));
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn count_of(&self, entity: EntityType, subtype: &str) -> Result<u64> {
        if let Some(delay) = self.slow_subtypes.get(subtype) {
            tokio::time::sleep(*delay).await;
        }
        match self.counts.get(&entity) {
            Some(counts) => Ok(counts.get(subtype).copied().unwrap_or(0)),
            None => Ok(self.documents.get(&entity).map_or(0, |d| d.len() as u64)),
        }
    }

    async fn range_of(&self, entity: EntityType, window: Window) -> Result<Vec<Document>> {
        let served = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if served >= *limit {
                token.cancel();
            }
        }
        if let Some((_, delay)) = self.slow_windows.iter().find(|(w, _)| *w == window) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_windows.contains(&window) {
            return Err(unavailable("window"));
        }
        Ok(self
            .documents
            .get(&entity)
            .map(|documents| {
                documents
                    .range(window.start_id..=window.end_id)
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn max_of(&self, entity: EntityType) -> Result<Option<i64>> {
        if self.fail_max_id {
            return Err(unavailable("max id"));
        }
        Ok(self
            .documents
            .get(&entity)
            .and_then(|documents| documents.keys().next_back().copied()))
    }
}

#[async_trait]
impl PrimaryStore for MemoryStore {
    async fn subtypes(&self, entity: EntityType) -> Result<Vec<String>> {
        if self.fail_subtype_listing {
            return Err(unavailable("subtype listing"));
        }
        Ok(match self.counts.get(&entity) {
            Some(counts) => counts.keys().cloned().collect(),
            None => vec![ALL_SUBTYPES.to_string()],
        })
    }

    async fn count(&self, entity: EntityType, subtype: &str) -> Result<u64> {
        self.count_of(entity, subtype).await
    }

    async fn fetch_range(&self, entity: EntityType, window: Window) -> Result<Vec<Document>> {
        self.range_of(entity, window).await
    }

    async fn max_id(&self, entity: EntityType) -> Result<Option<i64>> {
        self.max_of(entity)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn store_type(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl SearchIndex for MemoryStore {
    async fn count(&self, entity: EntityType, subtype: &str) -> Result<u64> {
        self.count_of(entity, subtype).await
    }

    async fn fetch_range(&self, entity: EntityType, window: Window) -> Result<Vec<Document>> {
        self.range_of(entity, window).await
    }

    async fn max_id(&self, entity: EntityType) -> Result<Option<i64>> {
        self.max_of(entity)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn store_type(&self) -> &str {
        "memory"
    }
}

/// Default WordPress layout with the given validation settings.
pub fn config(page_size: i64, concurrency: usize) -> Config {
    let mut config = Config::from_yaml(
        r#"
primary:
  host: localhost
  database: wordpress
  user: wp
index:
  url: http://localhost:9200
"#,
    )
    .expect("test config parses");
    config.validation = ValidationConfig {
        page_size,
        concurrency,
        timeout_secs: 1,
    };
    config
}
