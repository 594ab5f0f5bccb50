//! Validation orchestrator - sequences the comparators over entity types.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{validate_settings, Config};
use crate::core::{EntityType, PrimaryStore, SearchIndex};
use crate::error::{HealthError, Result};
use crate::index::ElasticsearchIndex;
use crate::primary::MysqlStore;
use crate::verify::{
    ContentComparator, ContentReport, CountComparator, CountReport, PageFetcher, ReportRecord,
    ValidationProgress, ValidationRange,
};

/// Validation orchestrator.
///
/// Holds the configuration and both store handles; contains no
/// entity-specific logic.
pub struct Orchestrator {
    config: Config,
    primary: Arc<dyn PrimaryStore>,
    index: Arc<dyn SearchIndex>,
    cancel: CancellationToken,
    progress_tx: Option<mpsc::Sender<ValidationProgress>>,
}

/// Result of a connectivity check against both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Database backend label (e.g. "mysql").
    pub primary_type: String,

    /// Whether the database answered.
    pub primary_connected: bool,

    /// Database round trip in milliseconds.
    pub primary_latency_ms: u64,

    /// Database error, if any.
    pub primary_error: Option<String>,

    /// Search index backend label (e.g. "elasticsearch").
    pub index_type: String,

    /// Whether the search index answered.
    pub index_connected: bool,

    /// Search index round trip in milliseconds.
    pub index_latency_ms: u64,

    /// Search index error, if any.
    pub index_error: Option<String>,

    /// Both stores answered.
    pub healthy: bool,
}

impl Orchestrator {
    /// Create an orchestrator backed by MySQL and Elasticsearch.
    pub async fn connect(config: Config) -> Result<Self> {
        let primary = MysqlStore::connect(&config).await?;
        let index = ElasticsearchIndex::new(&config)?;
        Ok(Self::new(config, Arc::new(primary), Arc::new(index)))
    }

    /// Create an orchestrator over existing store handles.
    pub fn new(
        config: Config,
        primary: Arc<dyn PrimaryStore>,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        info!(
            "Validating {} against {}",
            index.store_type(),
            primary.store_type()
        );
        Self {
            config,
            primary,
            index,
            cancel: CancellationToken::new(),
            progress_tx: None,
        }
    }

    /// Stop between waves / entities once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Set progress channel for content validation updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ValidationProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn fetcher(&self) -> PageFetcher {
        PageFetcher::new(
            self.primary.clone(),
            self.index.clone(),
            self.config.validation.timeout(),
        )
    }

    fn count_comparator(&self) -> CountComparator {
        CountComparator::new(self.fetcher(), self.config.validation.concurrency)
    }

    /// Validate counts of several entity types, in the given order.
    ///
    /// Fails before any I/O if an entity is not configured. An entity whose
    /// subtypes cannot be enumerated contributes one error record.
    pub async fn run_count_validation(&self, entities: &[EntityType]) -> Result<CountReport> {
        validate_settings(&self.config.validation)?;
        for entity in entities {
            self.config.entity(*entity)?;
        }

        let comparator = self.count_comparator();
        let mut report = CountReport::new();
        for entity in entities {
            if self.cancel.is_cancelled() {
                info!("Count validation cancelled before {}", entity);
                report.mark_cancelled();
                break;
            }
            match comparator.validate_counts(*entity).await {
                Ok(records) => report.extend(records),
                Err(e) => {
                    warn!("{}", e);
                    report.push(ReportRecord::from(e));
                }
            }
        }

        info!(
            "Count validation finished: {} record(s), {} error(s)",
            report.len(),
            report.errors().count()
        );
        Ok(report)
    }

    /// Validate counts of one entity type.
    ///
    /// Unlike [`run_count_validation`](Self::run_count_validation), failing to
    /// enumerate subtypes is returned as [`HealthError::Fetch`].
    pub async fn validate_counts(&self, entity: EntityType) -> Result<CountReport> {
        validate_settings(&self.config.validation)?;
        self.config.entity(entity)?;

        let records = self
            .count_comparator()
            .validate_counts(entity)
            .await
            .map_err(HealthError::from)?;

        let mut report = CountReport::new();
        report.extend(records);
        Ok(report)
    }

    /// Validate field contents of `entity` over `range`.
    pub async fn run_content_validation(
        &self,
        entity: EntityType,
        range: ValidationRange,
    ) -> Result<ContentReport> {
        validate_settings(&self.config.validation)?;
        let entity_config = self.config.entity(entity)?;

        let mut comparator = ContentComparator::new(
            self.fetcher(),
            self.config.validation.page_size,
            self.config.validation.concurrency,
        )
        .with_fields(entity, entity_config.fields.clone())
        .with_cancellation(self.cancel.clone());
        if let Some(tx) = &self.progress_tx {
            comparator = comparator.with_progress(tx.clone());
        }

        let scan = comparator.validate_contents(entity, range).await;

        let mut report = ContentReport::new();
        report.extend(scan.records);
        if scan.cancelled {
            report.mark_cancelled();
        }
        if let Some(id) = scan.resume_from {
            report.set_resume_from(id);
        }
        Ok(report)
    }

    /// Validate field contents of ids `start_id..=end_id` (up to the current
    /// maximum id when `end_id` is `None`).
    pub async fn validate_contents(
        &self,
        entity: EntityType,
        start_id: i64,
        end_id: Option<i64>,
    ) -> Result<ContentReport> {
        let range = ValidationRange::new(start_id, end_id)?;
        self.run_content_validation(entity, range).await
    }

    /// Ping both stores concurrently.
    pub async fn health_check(&self) -> HealthCheckResult {
        let timeout = self.config.validation.timeout();
        let (primary, index) = tokio::join!(
            timed(timeout, self.primary.ping()),
            timed(timeout, self.index.ping())
        );

        let (primary_latency_ms, primary_error) = primary;
        let (index_latency_ms, index_error) = index;
        HealthCheckResult {
            primary_type: self.primary.store_type().to_string(),
            index_type: self.index.store_type().to_string(),
            primary_connected: primary_error.is_none(),
            primary_latency_ms,
            index_connected: index_error.is_none(),
            index_latency_ms,
            healthy: primary_error.is_none() && index_error.is_none(),
            primary_error,
            index_error,
        }
    }
}

async fn timed<F>(timeout: Duration, ping: F) -> (u64, Option<String>)
where
    F: std::future::Future<Output = Result<()>>,
{
    let start = Instant::now();
    let error = match tokio::time::timeout(timeout, ping).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("timed out after {:?}", timeout)),
    };
    (start.elapsed().as_millis() as u64, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchScope, StoreSide};
    use crate::testing::{config, post, MemoryStore};
    use crate::verify::{ContentIssue, SideValue, Window};

    fn orchestrator(config: Config, primary: MemoryStore, index: MemoryStore) -> Orchestrator {
        Orchestrator::new(config, Arc::new(primary), Arc::new(index))
    }

    #[tokio::test]
    async fn test_missing_document_reported_once() {
        let primary = MemoryStore::new().with_posts([1, 2, 3]);
        let index = MemoryStore::new().with_posts([1, 3]);
        let report = orchestrator(config(500, 4), primary, index)
            .validate_contents(EntityType::Post, 1, Some(3))
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        let diff = report.diffs().next().unwrap();
        assert_eq!(diff.id, 2);
        assert_eq!(diff.issue, ContentIssue::MissingFromIndex);
        assert!(diff
            .mismatches
            .values()
            .all(|m| m.index == SideValue::Missing));
        assert!(report.has_inconsistencies());
        assert!(!report.has_errors());
    }

    #[tokio::test]
    async fn test_count_difference_reported() {
        let primary = MemoryStore::new().with_count(EntityType::Post, "post", 500);
        let index = MemoryStore::new().with_count(EntityType::Post, "post", 498);
        let report = orchestrator(config(500, 4), primary, index)
            .validate_counts(EntityType::Post)
            .await
            .unwrap();

        let diffs: Vec<_> = report.diffs().collect();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].db_total(), 500);
        assert_eq!(diffs[0].es_total(), 498);
        assert_eq!(diffs[0].diff(), 2);
        assert!(report.outcome().inconsistent);
    }

    #[tokio::test]
    async fn test_timed_out_subtype_is_error_record() {
        let primary = MemoryStore::new()
            .with_count(EntityType::Post, "page", 5)
            .with_count(EntityType::Post, "post", 8);
        let index = MemoryStore::new()
            .with_count(EntityType::Post, "page", 5)
            .with_count(EntityType::Post, "post", 8)
            .slow_subtype("page", Duration::from_secs(10));
        let report = orchestrator(config(500, 4), primary, index)
            .validate_counts(EntityType::Post)
            .await
            .unwrap();

        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].scope,
            FetchScope::Subtype {
                subtype: "page".into()
            }
        );
        assert_eq!(errors[0].source, Some(StoreSide::Index));

        let diffs: Vec<_> = report.diffs().collect();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].subtype(), "post");
        assert_eq!(diffs[0].diff(), 0);

        let outcome = report.outcome();
        assert!(outcome.incomplete);
        assert!(!outcome.inconsistent);
    }

    #[tokio::test]
    async fn test_failed_window_does_not_abort_scan() {
        let primary = MemoryStore::new()
            .with_posts(1..=90)
            .with_document(EntityType::Post, post(70).with_field("post_title", "Edited"));
        let index = MemoryStore::new()
            .with_posts(1..=90)
            .without(EntityType::Post, 5)
            .fail_window(Window::new(31, 60));
        let report = orchestrator(config(30, 2), primary, index)
            .validate_contents(EntityType::Post, 1, Some(90))
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.errors().count(), 1);
        let error = report.errors().next().unwrap();
        assert_eq!(
            error.scope,
            FetchScope::Window {
                start_id: 31,
                end_id: 60
            }
        );

        match &report.records()[0] {
            ReportRecord::Diff(diff) => assert_eq!(diff.id, 5),
            other => panic!("unexpected record {:?}", other),
        }
        assert!(report.records()[1].as_error().is_some());
        match &report.records()[2] {
            ReportRecord::Diff(diff) => {
                assert_eq!(diff.id, 70);
                assert_eq!(diff.issue, ContentIssue::FieldMismatch);
                assert_eq!(diff.mismatches.len(), 1);
                assert_eq!(
                    diff.mismatches["post_title"].primary,
                    SideValue::Value("Edited".into())
                );
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert!(report.resume_from().is_none());
    }

    #[tokio::test]
    async fn test_content_report_is_repeatable() {
        let build = || {
            let primary = MemoryStore::new()
                .with_posts(1..=40)
                .with_document(EntityType::Post, post(12).with_field("post_status", "draft"));
            let index = MemoryStore::new().with_posts(3..=45);
            orchestrator(config(7, 3), primary, index)
        };

        let first = build()
            .validate_contents(EntityType::Post, 1, None)
            .await
            .unwrap();
        let second = build()
            .validate_contents(EntityType::Post, 1, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        let ids: Vec<i64> = first.diffs().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 12, 41, 42, 43, 44, 45]);
    }

    #[tokio::test]
    async fn test_unbounded_scan_stops_past_max_id() {
        let primary = MemoryStore::new().with_posts(1..=25);
        let index = MemoryStore::new().with_posts(1..=25).with_posts([40]);
        let store = orchestrator(config(10, 1), primary, index);
        let report = store
            .validate_contents(EntityType::Post, 1, None)
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        let diff = report.diffs().next().unwrap();
        assert_eq!(diff.id, 40);
        assert_eq!(diff.issue, ContentIssue::MissingFromPrimary);
        assert!(!report.is_cancelled());
    }

    #[tokio::test]
    async fn test_unbounded_scan_reports_max_id_failure() {
        let primary = MemoryStore::new().with_posts(1..=5).fail_max_id();
        let index = MemoryStore::new().with_posts(1..=5);
        let report = orchestrator(config(10, 1), primary, index)
            .validate_contents(EntityType::Post, 1, None)
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        let error = report.errors().next().unwrap();
        assert_eq!(error.scope, FetchScope::Entity);
        assert_eq!(error.source, Some(StoreSide::Primary));
        assert_eq!(report.resume_from(), Some(21));
    }

    #[tokio::test]
    async fn test_cancellation_between_waves_sets_resume_point() {
        let token = CancellationToken::new();
        let primary = MemoryStore::new()
            .with_posts(1..=50)
            .cancel_after(2, token.clone());
        let index = MemoryStore::new().with_posts(1..=50).without(EntityType::Post, 15);
        let report = orchestrator(config(10, 1), primary, index)
            .with_cancellation(token)
            .validate_contents(EntityType::Post, 1, Some(50))
            .await
            .unwrap();

        assert!(report.is_cancelled());
        assert_eq!(report.resume_from(), Some(21));
        let ids: Vec<i64> = report.diffs().map(|d| d.id).collect();
        assert_eq!(ids, vec![15]);
        assert!(report.outcome().cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_last_wave_completes_scan() {
        let token = CancellationToken::new();
        let primary = MemoryStore::new()
            .with_posts(1..=20)
            .cancel_after(2, token.clone());
        let index = MemoryStore::new().with_posts(1..=20);
        let report = orchestrator(config(10, 2), primary, index)
            .with_cancellation(token.clone())
            .validate_contents(EntityType::Post, 1, Some(20))
            .await
            .unwrap();

        assert!(token.is_cancelled());
        assert!(!report.is_cancelled());
        assert_eq!(report.resume_from(), None);
        assert!(report.is_empty());
        assert!(report.outcome().is_clean());
    }

    #[tokio::test]
    async fn test_timed_out_window_is_error_record() {
        let primary = MemoryStore::new().with_posts(1..=30);
        let index = MemoryStore::new()
            .with_posts(1..=30)
            .without(EntityType::Post, 25)
            .slow_window(Window::new(11, 20), Duration::from_secs(10));
        let report = orchestrator(config(10, 3), primary, index)
            .validate_contents(EntityType::Post, 1, Some(30))
            .await
            .unwrap();

        assert_eq!(report.len(), 2);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].scope,
            FetchScope::Window {
                start_id: 11,
                end_id: 20
            }
        );
        assert_eq!(errors[0].source, Some(StoreSide::Index));
        assert!(errors[0].message.contains("timed out"));

        match &report.records()[1] {
            ReportRecord::Diff(diff) => {
                assert_eq!(diff.id, 25);
                assert_eq!(diff.issue, ContentIssue::MissingFromIndex);
            }
            other => panic!("unexpected record {:?}", other),
        }
        let outcome = report.outcome();
        assert!(outcome.inconsistent);
        assert!(outcome.incomplete);
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn test_progress_sent_per_window() {
        let (tx, mut rx) = mpsc::channel(16);
        let primary = MemoryStore::new().with_posts(1..=20);
        let index = MemoryStore::new().with_posts(1..=20);
        let report = orchestrator(config(10, 2), primary, index)
            .with_progress(tx)
            .validate_contents(EntityType::Post, 1, Some(20))
            .await
            .unwrap();
        assert!(report.is_empty());

        let first = rx.recv().await.unwrap();
        assert_eq!((first.window_start, first.window_end), (1, 10));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.windows_completed, 2);
    }

    #[tokio::test]
    async fn test_invalid_range_fails_before_io() {
        let primary = MemoryStore::new().with_posts(1..=10);
        let store = orchestrator(config(10, 1), primary, MemoryStore::new());
        let err = store
            .validate_contents(EntityType::Post, 10, Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Config(_)));

        let err = store
            .validate_contents(EntityType::Post, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_page_size_fails_before_io() {
        let mut settings = config(10, 1);
        settings.validation.page_size = 0;
        let primary = Arc::new(MemoryStore::new().with_posts(1..=10));
        let store = Orchestrator::new(settings, primary.clone(), Arc::new(MemoryStore::new()));
        let err = store
            .validate_contents(EntityType::Post, 1, Some(10))
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::Config(_)));
        assert_eq!(primary.fetches(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_entity_fails_fast() {
        let mut settings = config(10, 1);
        settings.entities.remove(&EntityType::User);
        let err = orchestrator(settings, MemoryStore::new(), MemoryStore::new())
            .run_count_validation(&[EntityType::Post, EntityType::User])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("entity 'user' is not configured"));
    }

    #[tokio::test]
    async fn test_subtype_listing_failure_contained_per_entity() {
        let primary = MemoryStore::new()
            .with_count(EntityType::User, "all", 3)
            .fail_subtype_listing();
        let index = MemoryStore::new().with_count(EntityType::User, "all", 3);
        let store = orchestrator(config(10, 1), primary, index);

        let report = store
            .run_count_validation(&[EntityType::Post, EntityType::User])
            .await
            .unwrap();
        assert_eq!(report.len(), 2);
        let error = report.records()[0].as_error().unwrap();
        assert_eq!(error.entity, EntityType::Post);
        assert_eq!(error.scope, FetchScope::Entity);
        // the failing listing affects every entity of this store
        assert!(report.records()[1].as_error().is_some());

        let err = store.validate_counts(EntityType::Post).await.unwrap_err();
        assert!(matches!(err, HealthError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let result = orchestrator(config(10, 1), MemoryStore::new(), MemoryStore::new())
            .health_check()
            .await;
        assert!(result.healthy);
        assert!(result.primary_connected && result.index_connected);
        assert!(result.primary_error.is_none());
        assert_eq!(result.primary_type, "memory");
        assert_eq!(result.index_type, "memory");
    }
}
