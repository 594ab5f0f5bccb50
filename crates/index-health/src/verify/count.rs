//! Count reconciliation per subtype.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::core::EntityType;
use crate::error::FetchError;

use super::fetcher::PageFetcher;
use super::types::{CountDiffRecord, CountRecord, ReportRecord};

/// Compares per-subtype totals of an entity in both stores.
#[derive(Clone)]
pub struct CountComparator {
    fetcher: PageFetcher,
    concurrency: usize,
}

impl CountComparator {
    pub fn new(fetcher: PageFetcher, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// One record per subtype, in enumeration order.
    ///
    /// A subtype whose count cannot be read on either side becomes an error
    /// record. Fails only when the subtypes cannot be enumerated.
    pub async fn validate_counts(
        &self,
        entity: EntityType,
    ) -> std::result::Result<Vec<CountRecord>, FetchError> {
        let subtypes = self.fetcher.subtypes(entity).await?;
        info!("Counting {} {} subtype(s)", subtypes.len(), entity);

        let mut records = Vec::with_capacity(subtypes.len());
        for chunk in subtypes.chunks(self.concurrency) {
            let results = join_all(
                chunk
                    .iter()
                    .map(|subtype| self.fetcher.count(entity, subtype)),
            )
            .await;

            for (subtype, result) in chunk.iter().zip(results) {
                records.push(match result {
                    Ok(totals) => {
                        let record =
                            CountDiffRecord::new(entity, subtype, totals.primary, totals.index);
                        debug!(
                            "{} type {}: db {}, es {}, diff {}",
                            entity,
                            subtype,
                            record.db_total(),
                            record.es_total(),
                            record.diff()
                        );
                        ReportRecord::Diff(record)
                    }
                    Err(e) => {
                        warn!("{}", e);
                        ReportRecord::from(e)
                    }
                });
            }
        }

        Ok(records)
    }
}
