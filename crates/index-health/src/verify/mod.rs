//! Validation engine comparing the database with the search index.
//!
//! Two comparison strategies share the same fetching and reporting machinery:
//!
//! - **Counts** ([`CountComparator`]): per-subtype totals from both stores,
//!   O(subtypes) queries regardless of data volume
//! - **Contents** ([`ContentComparator`]): documents fetched window by window
//!   via [`PageFetcher`] and compared field by field after [`normalize`]
//!
//! A subtype or window that cannot be read becomes an [`ErrorRecord`] instead
//! of aborting the run, so a report distinguishes "consistent", "inconsistent"
//! and "could not verify".

pub mod content;
pub mod count;
pub mod fetcher;
pub mod normalize;
pub mod report;
pub mod types;

// Re-exports
pub use content::{diff_page, ContentComparator, ContentScan};
pub use count::CountComparator;
pub use fetcher::{Page, PageFetcher, Totals};
pub use report::{ContentReport, CountReport, ValidationOutcome, ValidationReport};
pub use types::{
    ContentDiffRecord, ContentIssue, ContentRecord, CountDiffRecord, CountRecord, DiffRecord,
    ErrorRecord, FieldMismatch, ReportRecord, SideValue, ValidationProgress, ValidationRange,
    Window, Windows,
};
