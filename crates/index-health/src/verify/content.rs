//! Field-level reconciliation over an id range.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{Document, EntityType, FieldSpec};
use crate::error::FetchError;

use super::fetcher::{Page, PageFetcher};
use super::normalize::values_match;
use super::types::{
    ContentDiffRecord, ContentIssue, ContentRecord, FieldMismatch, ReportRecord, SideValue,
    ValidationProgress, ValidationRange, Window,
};

/// Result of a content scan.
#[derive(Debug, Clone, Default)]
pub struct ContentScan {
    /// Diff and error records in increasing id order.
    pub records: Vec<ContentRecord>,
    /// First id not validated when the scan stopped early.
    pub resume_from: Option<i64>,
    /// The scan stopped because of cancellation.
    pub cancelled: bool,
}

/// Scans an id range window by window and compares documents field by field.
pub struct ContentComparator {
    fetcher: PageFetcher,
    page_size: i64,
    concurrency: usize,
    fields: BTreeMap<EntityType, Vec<FieldSpec>>,
    cancel: CancellationToken,
    progress_tx: Option<mpsc::Sender<ValidationProgress>>,
}

impl ContentComparator {
    pub fn new(fetcher: PageFetcher, page_size: i64, concurrency: usize) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
            concurrency: concurrency.max(1),
            fields: BTreeMap::new(),
            cancel: CancellationToken::new(),
            progress_tx: None,
        }
    }

    /// Set the fields compared for an entity.
    pub fn with_fields(mut self, entity: EntityType, fields: Vec<FieldSpec>) -> Self {
        self.fields.insert(entity, fields);
        self
    }

    /// Stop between waves once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Set progress channel for updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ValidationProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    async fn send_progress(&self, update: ValidationProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(update).await;
        }
    }

    /// Validate every id of `range`.
    ///
    /// Windows are fetched `concurrency` at a time and reported in increasing
    /// id order. A window that cannot be fetched yields one error record and
    /// the scan moves on. Without an end id the scan stops at the first empty
    /// wave that reaches the current maximum id of both stores.
    pub async fn validate_contents(
        &self,
        entity: EntityType,
        range: ValidationRange,
    ) -> ContentScan {
        let fields = self.fields.get(&entity).map(Vec::as_slice).unwrap_or_default();
        let mut windows = range.windows(self.page_size);
        let mut scan = ContentScan::default();
        let mut next_start = range.start_id;
        let mut windows_completed = 0;
        let mut known_max: Option<i64> = None;

        info!(
            "Validating {} contents from id {} to {}",
            entity,
            range.start_id,
            range
                .end_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "max".to_string())
        );

        loop {
            let wave: Vec<Window> = windows.by_ref().take(self.concurrency).collect();
            let Some(last_window) = wave.last().copied() else {
                break;
            };

            // An exhausted range is complete even if the token fired meanwhile.
            if self.cancel.is_cancelled() {
                info!("{} content validation cancelled before id {}", entity, next_start);
                scan.cancelled = true;
                scan.resume_from = Some(next_start);
                break;
            }

            let pages = join_all(
                wave.iter()
                    .map(|window| self.fetcher.fetch_page(entity, *window)),
            )
            .await;

            let mut wave_empty = true;
            for (window, result) in wave.iter().zip(pages) {
                match result {
                    Ok(page) => {
                        wave_empty &= page.is_empty();
                        scan.records.extend(
                            diff_page(entity, fields, &page)
                                .into_iter()
                                .map(ReportRecord::Diff),
                        );
                    }
                    Err(e) => {
                        warn!("{}", e);
                        scan.records.push(ReportRecord::from(e));
                    }
                }
                windows_completed += 1;
                self.send_progress(ValidationProgress {
                    entity,
                    window_start: window.start_id,
                    window_end: window.end_id,
                    windows_completed,
                    records_found: scan.records.len(),
                })
                .await;
            }

            next_start = match last_window.end_id.checked_add(1) {
                Some(id) => id,
                None => break,
            };

            if range.end_id.is_none() && wave_empty {
                if known_max.is_some_and(|max| max > last_window.end_id) {
                    continue;
                }
                match self.current_max(entity).await {
                    Ok(Some(max)) if max > last_window.end_id => known_max = Some(max),
                    Ok(_) => break,
                    Err(e) => {
                        warn!("{}", e);
                        scan.records.push(ReportRecord::from(e));
                        scan.resume_from = Some(next_start);
                        break;
                    }
                }
            }
        }

        info!(
            "{} content validation finished: {} window(s), {} record(s)",
            entity,
            windows_completed,
            scan.records.len()
        );
        scan
    }

    async fn current_max(&self, entity: EntityType) -> std::result::Result<Option<i64>, FetchError> {
        let (primary, index) = self.fetcher.max_ids(entity).await?;
        debug!("{} max ids: db {:?}, es {:?}", entity, primary, index);
        Ok(primary.max(index))
    }
}

/// Compare the documents of one page, in ascending id order.
///
/// Ids outside the page's window are ignored.
pub fn diff_page(entity: EntityType, fields: &[FieldSpec], page: &Page) -> Vec<ContentDiffRecord> {
    let primary = by_id(page.window, &page.primary);
    let index = by_id(page.window, &page.index);
    let ids: BTreeSet<i64> = primary.keys().chain(index.keys()).copied().collect();

    let mut records = Vec::new();
    for id in ids {
        let record = match (primary.get(&id), index.get(&id)) {
            (Some(doc), None) => Some(missing(entity, fields, doc, ContentIssue::MissingFromIndex)),
            (None, Some(doc)) => Some(missing(entity, fields, doc, ContentIssue::MissingFromPrimary)),
            (Some(p), Some(i)) => compare_documents(entity, fields, p, i),
            (None, None) => None,
        };
        if let Some(record) = record {
            debug!("{} {}: {}", entity, record.id, record.issue);
            records.push(record);
        }
    }
    records
}

fn by_id(window: Window, docs: &[Document]) -> BTreeMap<i64, &Document> {
    docs.iter()
        .filter(|doc| window.contains(doc.id))
        .map(|doc| (doc.id, doc))
        .collect()
}

fn missing(
    entity: EntityType,
    fields: &[FieldSpec],
    present: &Document,
    issue: ContentIssue,
) -> ContentDiffRecord {
    let mismatches = fields
        .iter()
        .map(|field| {
            let value = SideValue::from(present.field(&field.name));
            let mismatch = match issue {
                ContentIssue::MissingFromPrimary => FieldMismatch {
                    primary: SideValue::Missing,
                    index: value,
                },
                _ => FieldMismatch {
                    primary: value,
                    index: SideValue::Missing,
                },
            };
            (field.name.clone(), mismatch)
        })
        .collect();

    ContentDiffRecord {
        entity,
        id: present.id,
        issue,
        mismatches,
    }
}

fn compare_documents(
    entity: EntityType,
    fields: &[FieldSpec],
    primary: &Document,
    index: &Document,
) -> Option<ContentDiffRecord> {
    let mismatches: BTreeMap<String, FieldMismatch> = fields
        .iter()
        .filter_map(|field| {
            let p = primary.field(&field.name);
            let i = index.field(&field.name);
            if values_match(field.kind, p, i) {
                None
            } else {
                Some((
                    field.name.clone(),
                    FieldMismatch {
                        primary: p.into(),
                        index: i.into(),
                    },
                ))
            }
        })
        .collect();

    if mismatches.is_empty() {
        return None;
    }
    Some(ContentDiffRecord {
        entity,
        id: primary.id,
        issue: ContentIssue::FieldMismatch,
        mismatches,
    })
}
