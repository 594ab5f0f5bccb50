//! Type definitions for count and content validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{EntityType, FieldValue};
use crate::error::{FetchError, FetchScope, HealthError, Result, StoreSide};

/// A consecutive id range processed as one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// First id (inclusive).
    pub start_id: i64,
    /// Last id (inclusive).
    pub end_id: i64,
}

impl Window {
    pub fn new(start_id: i64, end_id: i64) -> Self {
        Self { start_id, end_id }
    }

    /// Number of ids covered; never zero for a window built from a range.
    pub fn size(&self) -> i64 {
        self.end_id - self.start_id + 1
    }

    pub fn contains(&self, id: i64) -> bool {
        (self.start_id..=self.end_id).contains(&id)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start_id, self.end_id)
    }
}

/// Id range scanned by content validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRange {
    /// First id to validate (at least 1).
    pub start_id: i64,
    /// Last id to validate; `None` scans up to the current maximum id.
    pub end_id: Option<i64>,
}

impl ValidationRange {
    /// Create a range, rejecting `start_id < 1` and `start_id > end_id`.
    pub fn new(start_id: i64, end_id: Option<i64>) -> Result<Self> {
        if start_id < 1 {
            return Err(HealthError::Config(format!(
                "start id must be at least 1, got {}",
                start_id
            )));
        }
        if let Some(end_id) = end_id {
            if start_id > end_id {
                return Err(HealthError::Config(format!(
                    "start id {} is greater than last id {}",
                    start_id, end_id
                )));
            }
        }
        Ok(Self { start_id, end_id })
    }

    /// Consecutive, non-overlapping windows of `page_size` ids, in increasing order.
    ///
    /// The iterator is infinite for unbounded ranges.
    pub fn windows(&self, page_size: i64) -> Windows {
        Windows {
            next_start: Some(self.start_id),
            end_id: self.end_id,
            page_size: page_size.max(1),
        }
    }
}

/// Iterator over the windows of a [`ValidationRange`].
#[derive(Debug, Clone)]
pub struct Windows {
    next_start: Option<i64>,
    end_id: Option<i64>,
    page_size: i64,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let start = self.next_start?;
        if self.end_id.is_some_and(|end| start > end) {
            self.next_start = None;
            return None;
        }

        let mut last = start.saturating_add(self.page_size - 1);
        if let Some(end) = self.end_id {
            last = last.min(end);
        }
        self.next_start = last.checked_add(1);
        Some(Window::new(start, last))
    }
}

/// Records that can signal an inconsistency.
pub trait DiffRecord {
    /// Whether this record shows the two stores disagree.
    fn is_inconsistent(&self) -> bool;
}

/// Count comparison for one subtype of an entity.
///
/// `diff` is always `db_total - es_total`; the fields are private so the
/// invariant cannot be broken after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountDiffRecord {
    entity: EntityType,
    subtype: String,
    db_total: u64,
    es_total: u64,
    diff: i64,
}

impl CountDiffRecord {
    pub fn new(entity: EntityType, subtype: impl Into<String>, db_total: u64, es_total: u64) -> Self {
        let diff = (i128::from(db_total) - i128::from(es_total))
            .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
        Self {
            entity,
            subtype: subtype.into(),
            db_total,
            es_total,
            diff,
        }
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn db_total(&self) -> u64 {
        self.db_total
    }

    pub fn es_total(&self) -> u64 {
        self.es_total
    }

    pub fn diff(&self) -> i64 {
        self.diff
    }

    pub fn is_consistent(&self) -> bool {
        self.diff == 0
    }
}

impl DiffRecord for CountDiffRecord {
    fn is_inconsistent(&self) -> bool {
        !self.is_consistent()
    }
}

/// Why a document was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentIssue {
    /// Present in the database, absent from the index.
    MissingFromIndex,
    /// Present in the index, absent from the database.
    MissingFromPrimary,
    /// Present in both with at least one differing field.
    FieldMismatch,
}

impl fmt::Display for ContentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentIssue::MissingFromIndex => write!(f, "missing from index"),
            ContentIssue::MissingFromPrimary => write!(f, "missing from database"),
            ContentIssue::FieldMismatch => write!(f, "field mismatch"),
        }
    }
}

/// One side of a field comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum SideValue {
    /// The whole document is absent from this store.
    Missing,
    /// The document exists but the field is NULL / absent.
    Null,
    /// Raw value as read from the store.
    Value(String),
}

impl From<&FieldValue> for SideValue {
    fn from(value: &FieldValue) -> Self {
        match value.as_text() {
            Some(text) => SideValue::Value(text),
            None => SideValue::Null,
        }
    }
}

impl fmt::Display for SideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideValue::Missing => write!(f, "<missing>"),
            SideValue::Null => write!(f, "NULL"),
            SideValue::Value(v) => write!(f, "{:?}", v),
        }
    }
}

/// Database and index values of a field that differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub primary: SideValue,
    pub index: SideValue,
}

/// Content comparison result for one document that differs.
///
/// Documents missing from one store list every compared field, with
/// [`SideValue::Missing`] on the absent side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentDiffRecord {
    pub entity: EntityType,
    pub id: i64,
    pub issue: ContentIssue,
    pub mismatches: BTreeMap<String, FieldMismatch>,
}

impl DiffRecord for ContentDiffRecord {
    fn is_inconsistent(&self) -> bool {
        true
    }
}

/// A subtype, window or entity that could not be validated.
///
/// Means "unknown", never "consistent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub entity: EntityType,
    pub scope: FetchScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<StoreSide>,
    pub message: String,
}

impl From<FetchError> for ErrorRecord {
    fn from(err: FetchError) -> Self {
        Self {
            entity: err.entity,
            scope: err.scope,
            source: Some(err.side),
            message: err.message,
        }
    }
}

/// A report entry: either a comparison result or an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportRecord<D> {
    Diff(D),
    Error(ErrorRecord),
}

impl<D> ReportRecord<D> {
    pub fn as_diff(&self) -> Option<&D> {
        match self {
            ReportRecord::Diff(diff) => Some(diff),
            ReportRecord::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorRecord> {
        match self {
            ReportRecord::Diff(_) => None,
            ReportRecord::Error(err) => Some(err),
        }
    }
}

impl<D> From<FetchError> for ReportRecord<D> {
    fn from(err: FetchError) -> Self {
        ReportRecord::Error(err.into())
    }
}

/// Entry of a count report.
pub type CountRecord = ReportRecord<CountDiffRecord>;

/// Entry of a content report.
pub type ContentRecord = ReportRecord<ContentDiffRecord>;

/// Progress update for content validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationProgress {
    /// Entity being scanned.
    pub entity: EntityType,
    /// First id of the finished window.
    pub window_start: i64,
    /// Last id of the finished window.
    pub window_end: i64,
    /// Number of windows finished so far.
    pub windows_completed: usize,
    /// Diff and error records produced so far.
    pub records_found: usize,
}
