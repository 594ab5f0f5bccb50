//! # index-health
//!
//! Consistency validation between a WordPress MySQL database and the
//! Elasticsearch index built from it.
//!
//! The library detects divergence without touching either store:
//!
//! - **Count validation** compares per-subtype totals (post types, users)
//! - **Content validation** scans an id range window by window and compares
//!   configured fields after normalization
//! - **Partial failures** (a subtype or window that cannot be read) become
//!   error records instead of aborting the run
//! - **Resumable scans**: windows are reported in increasing id order and a
//!   cancelled scan reports the first id left to validate
//!
//! ## Example
//!
//! ```rust,no_run
//! use index_health::{Config, EntityType, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> index_health::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::connect(config).await?;
//!     let report = orchestrator.validate_contents(EntityType::Post, 1, None).await?;
//!     println!("{} inconsistent documents", report.diffs().count());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod index;
pub mod orchestrator;
pub mod primary;
pub mod verify;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, EntityConfig, IndexConfig, PrimaryConfig, ValidationConfig};
pub use core::{Document, EntityType, FieldKind, FieldSpec, FieldValue, PrimaryStore, SearchIndex};
pub use error::{FetchError, FetchScope, HealthError, Result, StoreSide};
pub use index::ElasticsearchIndex;
pub use orchestrator::{HealthCheckResult, Orchestrator};
pub use primary::MysqlStore;
pub use verify::{
    ContentDiffRecord, ContentReport, CountDiffRecord, CountReport, ErrorRecord, ReportRecord,
    ValidationOutcome, ValidationProgress, ValidationRange, ValidationReport,
};
