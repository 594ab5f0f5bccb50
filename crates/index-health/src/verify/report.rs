//! Validation reports.

use serde::Serialize;

use super::types::{
    ContentDiffRecord, CountDiffRecord, DiffRecord, ErrorRecord, ReportRecord,
};

/// Ordered collection of records produced by one validation run.
///
/// Records keep the order in which subtypes / windows were scheduled, never
/// completion order, so two runs over unchanged data serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport<D> {
    records: Vec<ReportRecord<D>>,
    cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resume_from: Option<i64>,
}

/// Report of a count validation.
pub type CountReport = ValidationReport<CountDiffRecord>;

/// Report of a content validation.
pub type ContentReport = ValidationReport<ContentDiffRecord>;

/// Summary of a finished run, used to pick an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ValidationOutcome {
    /// At least one diff record shows the stores disagree.
    pub inconsistent: bool,
    /// At least one subtype or window could not be checked.
    pub incomplete: bool,
    /// The run stopped before covering its whole range.
    pub cancelled: bool,
}

impl ValidationOutcome {
    /// Checked everything and found nothing.
    pub fn is_clean(&self) -> bool {
        !self.inconsistent && !self.incomplete && !self.cancelled
    }
}

impl<D> Default for ValidationReport<D> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cancelled: false,
            resume_from: None,
        }
    }
}

impl<D> ValidationReport<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ReportRecord<D>) {
        self.records.push(record);
    }

    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = ReportRecord<D>>,
    {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[ReportRecord<D>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ReportRecord<D>> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn diffs(&self) -> impl Iterator<Item = &D> {
        self.records.iter().filter_map(ReportRecord::as_diff)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter_map(ReportRecord::as_error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// First id not covered when the run stopped early.
    pub fn resume_from(&self) -> Option<i64> {
        self.resume_from
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn set_resume_from(&mut self, id: i64) {
        self.resume_from = Some(id);
    }
}

impl<D: DiffRecord> ValidationReport<D> {
    pub fn has_inconsistencies(&self) -> bool {
        self.diffs().any(DiffRecord::is_inconsistent)
    }

    pub fn outcome(&self) -> ValidationOutcome {
        ValidationOutcome {
            inconsistent: self.has_inconsistencies(),
            incomplete: self.has_errors(),
            cancelled: self.cancelled,
        }
    }
}
